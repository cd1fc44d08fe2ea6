//! JSON shapes exchanged with hosts
//!
//! `kibitz serve` reads one [`Request`] per stdin line and writes one
//! [`Response`] per stdout line. `kibitz eval` prints an [`Evaluation`].

use kibitz_core::{AnalysisError, AnalysisResult, Score};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One request line
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Evaluate {
        #[serde(default)]
        id: Value,
        session: String,
        fen: String,
        #[serde(default)]
        depth: Option<u32>,
    },
    Remove {
        #[serde(default)]
        id: Value,
        session: String,
    },
    List {
        #[serde(default)]
        id: Value,
    },
    Shutdown {
        #[serde(default)]
        id: Value,
    },
}

impl Request {
    /// Caller-chosen correlation id, echoed back in the response
    pub fn id(&self) -> &Value {
        match self {
            Request::Evaluate { id, .. }
            | Request::Remove { id, .. }
            | Request::List { id }
            | Request::Shutdown { id } => id,
        }
    }
}

/// Evaluation as reported to hosts
///
/// A missing score is reported as `cp 0`, so hosts always get a number.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub evaluation: Score,
    pub best_move: Option<String>,
    pub pv: Vec<String>,
    pub depth: u32,
}

impl Evaluation {
    pub fn new(result: AnalysisResult, depth: u32) -> Self {
        Self {
            evaluation: result.score.unwrap_or(Score::Cp(0)),
            best_move: result.best_move,
            pv: result.pv,
            depth,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

/// One response line
#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(id: Value, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self {
                id,
                ok: true,
                result: Some(result),
                error: None,
            },
            Err(e) => Self::failure(id, "internal", e.to_string()),
        }
    }

    pub fn failure(id: Value, kind: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(ErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }

    pub fn from_analysis_error(id: Value, error: &AnalysisError) -> Self {
        Self::failure(id, error.kind(), error.to_string())
    }

    /// Acknowledgement with no payload
    pub fn done(id: Value) -> Self {
        Self {
            id,
            ok: true,
            result: None,
            error: None,
        }
    }
}
