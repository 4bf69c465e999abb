//! Types and methods for producing structured optimization remarks.
//!
//! Every accept and reject point of the inliner emits a remark, in the order
//! the corresponding IR mutations (or refusals) happen. The sink is plain
//! data so callers can render or discard the records as they see fit.
use std::fmt;

/// The unique ID of a remark.
#[derive(PartialEq, Eq, Copy, Clone)]
pub enum RemarkId {
    AlwaysInline,
    NeverInline,
    TooCostly,
    IncreaseCostInOtherContexts,
    CanBeInlined,
    Inlined,
    NotInlined,
    NoDefinition,
}

impl fmt::Display for RemarkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let id = match self {
            RemarkId::AlwaysInline => "AlwaysInline",
            RemarkId::NeverInline => "NeverInline",
            RemarkId::TooCostly => "TooCostly",
            RemarkId::IncreaseCostInOtherContexts => {
                "IncreaseCostInOtherContexts"
            }
            RemarkId::CanBeInlined => "CanBeInlined",
            RemarkId::Inlined => "Inlined",
            RemarkId::NotInlined => "NotInlined",
            RemarkId::NoDefinition => "NoDefinition",
        };

        write!(f, "{}", id)
    }
}

impl fmt::Debug for RemarkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// The type/kind of a remark.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RemarkKind {
    /// Analysis of a decision, emitted whether or not it leads to a change.
    Analysis,
    /// An optimization opportunity that was not taken.
    Missed,
    /// An optimization that was performed.
    Performed,
}

impl fmt::Display for RemarkKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RemarkKind::Analysis => write!(f, "analysis"),
            RemarkKind::Missed => write!(f, "missed"),
            RemarkKind::Performed => write!(f, "performed"),
        }
    }
}

/// A single structured remark.
pub struct Remark {
    kind: RemarkKind,
    id: RemarkId,
    callee: String,
    caller: String,
    cost: Option<i32>,
    threshold: Option<i32>,
}

impl Remark {
    pub fn new(
        kind: RemarkKind,
        id: RemarkId,
        callee: String,
        caller: String,
    ) -> Remark {
        Remark { kind, id, callee, caller, cost: None, threshold: None }
    }

    pub fn with_cost(mut self, cost: i32, threshold: i32) -> Remark {
        self.cost = Some(cost);
        self.threshold = Some(threshold);
        self
    }

    pub fn kind(&self) -> RemarkKind {
        self.kind
    }

    pub fn id(&self) -> RemarkId {
        self.id
    }

    pub fn callee(&self) -> &str {
        &self.callee
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn cost(&self) -> Option<i32> {
        self.cost
    }

    pub fn threshold(&self) -> Option<i32> {
        self.threshold
    }
}

impl fmt::Display for Remark {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {}: Callee = {}, Caller = {}",
            self.kind, self.id, self.callee, self.caller
        )?;

        if let (Some(cost), Some(threshold)) = (self.cost, self.threshold) {
            write!(f, ", Cost = {}, Threshold = {}", cost, threshold)?;
        }

        Ok(())
    }
}

/// An ordered collection of remarks produced during a pass.
pub struct Remarks {
    values: Vec<Remark>,
}

impl Remarks {
    pub fn new() -> Remarks {
        Remarks { values: Vec::new() }
    }

    pub fn emit(&mut self, remark: Remark) {
        self.values.push(remark);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Remark> {
        self.values.iter()
    }

    pub fn ids(&self) -> Vec<RemarkId> {
        self.values.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remark_display() {
        let remark = Remark::new(
            RemarkKind::Analysis,
            RemarkId::TooCostly,
            "callee".to_string(),
            "caller".to_string(),
        )
        .with_cost(100, 50);

        assert_eq!(
            remark.to_string(),
            "analysis: TooCostly: Callee = callee, Caller = caller, \
             Cost = 100, Threshold = 50"
        );
    }

    #[test]
    fn test_remarks_order() {
        let mut remarks = Remarks::new();

        remarks.emit(Remark::new(
            RemarkKind::Missed,
            RemarkId::NoDefinition,
            "a".to_string(),
            "b".to_string(),
        ));
        remarks.emit(Remark::new(
            RemarkKind::Performed,
            RemarkId::Inlined,
            "c".to_string(),
            "b".to_string(),
        ));

        assert_eq!(
            remarks.ids(),
            vec![RemarkId::NoDefinition, RemarkId::Inlined]
        );
    }
}
