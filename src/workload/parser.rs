// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Workload text format.
//!
//! One operation record per line:
//!
//! ```text
//! begin  <tid> <r|w>
//! read   <tid> <item>
//! write  <tid> <item>
//! commit <tid>
//! abort  <tid>
//! end
//! ```
//!
//! Keywords are case-insensitive; blank lines and `//` comments are skipped.
//! The `end` marker terminates the workload and triggers teardown; anything
//! after it is ignored.

use crate::txn::{ItemId, OpKind, TxnId, TxnKind};

/// One parsed operation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadOp {
    pub tid: TxnId,
    pub kind: OpKind,
}

/// A parsed workload: the operations up to (and not including) `end`.
#[derive(Debug, Clone, Default)]
pub struct Workload {
    pub ops: Vec<WorkloadOp>,
}

impl Workload {
    /// Largest item id referenced by any operation, if any.
    pub fn max_item(&self) -> Option<ItemId> {
        self.ops
            .iter()
            .filter_map(|op| match op.kind {
                OpKind::Read(item) | OpKind::Write(item) => Some(item),
                _ => None,
            })
            .max_by_key(|item| item.0)
    }
}

/// Workload parse errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unknown directive '{token}'")]
    UnknownDirective { line: usize, token: String },

    #[error("line {line}: missing {what}")]
    MissingField { line: usize, what: &'static str },

    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: invalid transaction kind '{token}' (expected r or w)")]
    InvalidKind { line: usize, token: String },

    #[error("workload has no 'end' marker")]
    MissingTerminator,
}

fn parse_number<T: std::str::FromStr>(
    line: usize,
    token: Option<&str>,
    what: &'static str,
) -> Result<T, ParseError> {
    let token = token.ok_or(ParseError::MissingField { line, what })?;
    token.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}

/// Parses workload text into an operation sequence.
pub fn parse(text: &str) -> Result<Workload, ParseError> {
    let mut ops = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split("//").next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let mut fields = content.split_whitespace();
        let directive = fields.next().unwrap_or("").to_ascii_lowercase();

        if directive == "end" {
            return Ok(Workload { ops });
        }

        let tid = TxnId(parse_number(line, fields.next(), "transaction id")?);
        let kind = match directive.as_str() {
            "begin" => {
                let token = fields.next().ok_or(ParseError::MissingField {
                    line,
                    what: "transaction kind",
                })?;
                match token.to_ascii_lowercase().as_str() {
                    "r" => OpKind::Begin(TxnKind::ReadOnly),
                    "w" => OpKind::Begin(TxnKind::ReadWrite),
                    _ => {
                        return Err(ParseError::InvalidKind {
                            line,
                            token: token.to_string(),
                        })
                    }
                }
            }
            "read" => OpKind::Read(ItemId(parse_number(line, fields.next(), "item id")?)),
            "write" => OpKind::Write(ItemId(parse_number(line, fields.next(), "item id")?)),
            "commit" => OpKind::Commit,
            "abort" => OpKind::Abort,
            _ => {
                return Err(ParseError::UnknownDirective {
                    line,
                    token: directive,
                })
            }
        };
        ops.push(WorkloadOp { tid, kind });
    }

    Err(ParseError::MissingTerminator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_workload() {
        let text = "\
// simple two-transaction schedule
begin 1 w
write 1 0
begin 2 r

read 2 0
commit 1
abort 2
end
";
        let workload = parse(text).unwrap();
        assert_eq!(workload.ops.len(), 6);
        assert_eq!(
            workload.ops[0],
            WorkloadOp {
                tid: TxnId(1),
                kind: OpKind::Begin(TxnKind::ReadWrite),
            }
        );
        assert_eq!(
            workload.ops[3],
            WorkloadOp {
                tid: TxnId(2),
                kind: OpKind::Read(ItemId(0)),
            }
        );
        assert_eq!(workload.ops[5].kind, OpKind::Abort);
        assert_eq!(workload.max_item(), Some(ItemId(0)));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let workload = parse("Begin 1 W\nWRITE 1 3\nCommit 1\nEND\n").unwrap();
        assert_eq!(workload.ops.len(), 3);
        assert_eq!(workload.ops[1].kind, OpKind::Write(ItemId(3)));
    }

    #[test]
    fn test_input_after_end_is_ignored() {
        let workload = parse("begin 1 w\nend\nwrite 1 0\n").unwrap();
        assert_eq!(workload.ops.len(), 1);
    }

    #[test]
    fn test_missing_end_marker() {
        let err = parse("begin 1 w\ncommit 1\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingTerminator));
    }

    #[test]
    fn test_unknown_directive() {
        let err = parse("frobnicate 1\nend\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownDirective { line: 1, .. }
        ));
    }

    #[test]
    fn test_bad_numbers_and_kinds() {
        assert!(matches!(
            parse("begin x w\nend\n").unwrap_err(),
            ParseError::InvalidNumber { line: 1, .. }
        ));
        assert!(matches!(
            parse("begin 1 q\nend\n").unwrap_err(),
            ParseError::InvalidKind { line: 1, .. }
        ));
        assert!(matches!(
            parse("read 1\nend\n").unwrap_err(),
            ParseError::MissingField { line: 1, .. }
        ));
    }

    #[test]
    fn test_empty_workload_needs_end() {
        assert!(matches!(
            parse("// nothing here\n").unwrap_err(),
            ParseError::MissingTerminator
        ));
        let workload = parse("end\n").unwrap();
        assert!(workload.ops.is_empty());
        assert!(workload.max_item().is_none());
    }
}
