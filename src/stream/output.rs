//! Output Ports
//!
//! Each stage returns a small set of tagged records per input instead of
//! signalling side channels out of band. The three ports are independent,
//! append-only channels:
//!
//! - `Primary`: on-time tampering results
//! - `Late`: raw contacts accepted after their window fired
//! - `Audit`: every accepted contact, exactly once

use crate::models::{Contact, TamperingResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPort {
    Primary,
    Late,
    Audit,
}

impl OutputPort {
    pub const ALL: [OutputPort; 3] = [OutputPort::Primary, OutputPort::Late, OutputPort::Audit];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputPort::Primary => "primary",
            OutputPort::Late => "late",
            OutputPort::Audit => "audit",
        }
    }
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record bound for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRecord {
    Tampering(TamperingResult),
    Late(Contact),
    Audit(Contact),
}

impl OutputRecord {
    #[inline]
    pub fn port(&self) -> OutputPort {
        match self {
            OutputRecord::Tampering(_) => OutputPort::Primary,
            OutputRecord::Late(_) => OutputPort::Late,
            OutputRecord::Audit(_) => OutputPort::Audit,
        }
    }

    /// Serialized payload as written to the port's sink.
    pub fn to_wire(&self) -> serde_json::Result<String> {
        match self {
            OutputRecord::Tampering(result) => serde_json::to_string(result),
            OutputRecord::Late(contact) | OutputRecord::Audit(contact) => {
                serde_json::to_string(contact)
            }
        }
    }

    pub fn as_result(&self) -> Option<&TamperingResult> {
        match self {
            OutputRecord::Tampering(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_contact(&self) -> Option<&Contact> {
        match self {
            OutputRecord::Late(contact) | OutputRecord::Audit(contact) => Some(contact),
            OutputRecord::Tampering(_) => None,
        }
    }
}

/// Split a batch of records by port, preserving order within each port.
pub fn partition(records: &[OutputRecord]) -> PortBuckets<'_> {
    let mut buckets = PortBuckets::default();
    for record in records {
        match record {
            OutputRecord::Tampering(result) => buckets.primary.push(result),
            OutputRecord::Late(contact) => buckets.late.push(contact),
            OutputRecord::Audit(contact) => buckets.audit.push(contact),
        }
    }
    buckets
}

#[derive(Debug, Default)]
pub struct PortBuckets<'a> {
    pub primary: Vec<&'a TamperingResult>,
    pub late: Vec<&'a Contact>,
    pub audit: Vec<&'a Contact>,
}
