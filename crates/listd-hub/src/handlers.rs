//! Intercepted requests
//!
//! Requests whose word maps to an [`Intercept`] are answered by the hub; all
//! other requests go to the playout service untouched. Handlers only compute
//! an [`Outcome`]; the event loop decides who receives it.

use listd_core::{Message, Request, Response, Word};

use crate::playlist::{ItemKind, PlaylistItem};
use crate::state::{HubState, Outcome};

/// Signature shared by every intercepted request
pub type Handler = fn(&mut HubState, &Message) -> Outcome;

/// Request words the hub answers itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intercept {
    Enqueue,
    Dequeue,
    Select,
    List,
    Dump,
    AutoAdvance,
    /// `load`/`eject` belong to the hub's own selection logic
    Rejected,
}

impl Intercept {
    pub fn from_word(word: &Word) -> Option<Self> {
        match word {
            Word::Request(Request::Enqueue) => Some(Intercept::Enqueue),
            Word::Request(Request::Dequeue) => Some(Intercept::Dequeue),
            Word::Request(Request::Select) => Some(Intercept::Select),
            Word::Request(Request::List) => Some(Intercept::List),
            Word::Request(Request::Dump) => Some(Intercept::Dump),
            Word::Request(Request::AutoAdvance) => Some(Intercept::AutoAdvance),
            Word::Request(Request::Load) | Word::Request(Request::Eject) => {
                Some(Intercept::Rejected)
            }
            _ => None,
        }
    }

    pub fn handler(self) -> Handler {
        match self {
            Intercept::Enqueue => enqueue,
            Intercept::Dequeue => dequeue,
            Intercept::Select => select,
            Intercept::List => list,
            Intercept::Dump => dump,
            Intercept::AutoAdvance => auto_advance,
            Intercept::Rejected => rejected,
        }
    }

    pub fn handle(self, state: &mut HubState, request: &Message) -> Outcome {
        (self.handler())(state, request)
    }
}

fn what(reason: &str) -> Outcome {
    Outcome::respond(vec![Message::response(Response::What).with_arg(reason)])
}

fn fail(reason: impl ToString) -> Outcome {
    Outcome::respond(vec![Message::response(Response::Fail).with_arg(reason.to_string())])
}

fn bad_command() -> Outcome {
    what("Bad command")
}

enum Index {
    Valid(usize),
    Negative,
    NotANumber,
}

fn parse_index(s: &str) -> Index {
    match s.parse::<i64>() {
        Ok(i) if i < 0 => Index::Negative,
        Ok(i) => usize::try_from(i).map_or(Index::Negative, Index::Valid),
        Err(_) => Index::NotANumber,
    }
}

/// Resolve an index argument, or the outcome to return instead
fn index_arg(s: &str) -> Result<usize, Outcome> {
    match parse_index(s) {
        Index::Valid(i) => Ok(i),
        Index::Negative => Err(fail("Index out of bounds")),
        Index::NotANumber => Err(what("Bad index")),
    }
}

fn enqueue(state: &mut HubState, request: &Message) -> Outcome {
    let Ok(args) = request.expect_args(4) else {
        return bad_command();
    };
    let index = match index_arg(&args[0]) {
        Ok(i) => i,
        Err(outcome) => return outcome,
    };
    let Ok(kind) = args[2].parse::<ItemKind>() else {
        return what("Bad item type");
    };

    let item = PlaylistItem::new(kind, args[1].as_str(), args[3].as_str());
    let old_selection = state.playlist.selection();
    let new_index = match state.playlist.enqueue(index, item) {
        Ok(i) => i,
        Err(e) => return fail(e),
    };

    let mut responses = Vec::with_capacity(2);
    if state.playlist.selection() != old_selection {
        responses.push(state.select_message());
    }
    responses.push(
        Message::response(Response::Enqueue)
            .with_arg(new_index.to_string())
            .with_args(args[1..].iter().cloned()),
    );
    Outcome::respond(responses)
}

fn dequeue(state: &mut HubState, request: &Message) -> Outcome {
    let Ok(args) = request.expect_args(2) else {
        return bad_command();
    };
    let index = match index_arg(&args[0]) {
        Ok(i) => i,
        Err(outcome) => return outcome,
    };

    let old_selection = state.playlist.selection();
    let (removed_index, removed_hash) = match state.playlist.dequeue(index, &args[1]) {
        Ok(removed) => removed,
        Err(e) => return fail(e),
    };

    let mut responses = Vec::with_capacity(2);
    if state.playlist.selection() != old_selection {
        responses.push(state.select_message());
    }
    responses.push(
        Message::response(Response::Dequeue)
            .with_arg(removed_index.to_string())
            .with_arg(removed_hash),
    );
    Outcome::respond(responses)
}

fn select(state: &mut HubState, request: &Message) -> Outcome {
    match request.args() {
        [] => match state.playlist.clear_selection() {
            Ok(()) => Outcome {
                responses: vec![state.select_message()],
                downstream: vec![Message::request(Request::Eject)],
            },
            Err(e) => fail(e),
        },
        [index, hash] => {
            let index = match index_arg(index) {
                Ok(i) => i,
                Err(outcome) => return outcome,
            };
            if let Err(e) = state.playlist.select(index, hash) {
                return fail(e);
            }
            Outcome {
                responses: vec![state.select_message()],
                downstream: state.load_selected().into_iter().collect(),
            }
        }
        _ => bad_command(),
    }
}

fn list(state: &mut HubState, _request: &Message) -> Outcome {
    Outcome::respond(state.list())
}

fn dump(state: &mut HubState, _request: &Message) -> Outcome {
    Outcome::respond(state.dump())
}

fn auto_advance(state: &mut HubState, request: &Message) -> Outcome {
    let Ok(args) = request.expect_args(1) else {
        return bad_command();
    };
    match args[0].as_str() {
        "on" => state.auto_advance = true,
        "off" => state.auto_advance = false,
        _ => return what("Bad argument"),
    }
    Outcome::respond(vec![state.auto_advance_message()])
}

fn rejected(_state: &mut HubState, _request: &Message) -> Outcome {
    bad_command()
}
