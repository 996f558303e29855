//! Command and response words

use std::fmt;

/// Request words (client -> service), lower-case on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    Load,
    Eject,
    Play,
    Stop,
    Seek,
    Quit,
    Dump,
    Enqueue,
    Dequeue,
    Select,
    List,
    AutoAdvance,
}

impl Request {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "load" => Some(Request::Load),
            "eject" => Some(Request::Eject),
            "play" => Some(Request::Play),
            "stop" => Some(Request::Stop),
            "seek" => Some(Request::Seek),
            "quit" => Some(Request::Quit),
            "dump" => Some(Request::Dump),
            "enqueue" => Some(Request::Enqueue),
            "dequeue" => Some(Request::Dequeue),
            "select" => Some(Request::Select),
            "list" => Some(Request::List),
            "autoadvance" => Some(Request::AutoAdvance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Request::Load => "load",
            Request::Eject => "eject",
            Request::Play => "play",
            Request::Stop => "stop",
            Request::Seek => "seek",
            Request::Quit => "quit",
            Request::Dump => "dump",
            Request::Enqueue => "enqueue",
            Request::Dequeue => "dequeue",
            Request::Select => "select",
            Request::List => "list",
            Request::AutoAdvance => "autoadvance",
        }
    }
}

/// Response words (service -> client), upper-case on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Response {
    Ok,
    What,
    Fail,
    Ohai,
    State,
    Time,
    File,
    Features,
    End,
    Count,
    Item,
    Select,
    Enqueue,
    Dequeue,
    AutoAdvance,
}

impl Response {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(Response::Ok),
            "WHAT" => Some(Response::What),
            "FAIL" => Some(Response::Fail),
            "OHAI" => Some(Response::Ohai),
            "STATE" => Some(Response::State),
            "TIME" => Some(Response::Time),
            "FILE" => Some(Response::File),
            "FEATURES" => Some(Response::Features),
            "END" => Some(Response::End),
            "COUNT" => Some(Response::Count),
            "ITEM" => Some(Response::Item),
            "SELECT" => Some(Response::Select),
            "ENQUEUE" => Some(Response::Enqueue),
            "DEQUEUE" => Some(Response::Dequeue),
            "AUTOADVANCE" => Some(Response::AutoAdvance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Response::Ok => "OK",
            Response::What => "WHAT",
            Response::Fail => "FAIL",
            Response::Ohai => "OHAI",
            Response::State => "STATE",
            Response::Time => "TIME",
            Response::File => "FILE",
            Response::Features => "FEATURES",
            Response::End => "END",
            Response::Count => "COUNT",
            Response::Item => "ITEM",
            Response::Select => "SELECT",
            Response::Enqueue => "ENQUEUE",
            Response::Dequeue => "DEQUEUE",
            Response::AutoAdvance => "AUTOADVANCE",
        }
    }

    /// Whether this word reports a rejected request
    pub fn is_failure(&self) -> bool {
        matches!(self, Response::What | Response::Fail)
    }
}

/// The leading word of a message
///
/// Words the hub does not know are kept verbatim in [`Word::Unknown`] so that
/// they can be relayed without loss.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Word {
    Request(Request),
    Response(Response),
    Unknown(String),
}

impl Word {
    pub fn parse(s: &str) -> Self {
        if let Some(rq) = Request::from_wire(s) {
            Word::Request(rq)
        } else if let Some(rs) = Response::from_wire(s) {
            Word::Response(rs)
        } else {
            Word::Unknown(s.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Word::Request(rq) => rq.as_str(),
            Word::Response(rs) => rs.as_str(),
            Word::Unknown(s) => s,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Word::Response(rs) if rs.is_failure())
    }
}

impl From<Request> for Word {
    fn from(rq: Request) -> Self {
        Word::Request(rq)
    }
}

impl From<Response> for Word {
    fn from(rs: Response) -> Self {
        Word::Response(rs)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
