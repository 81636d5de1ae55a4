use std::fmt;

use bson::Document;

use crate::driver::BoxError;
use crate::error::Error;

/// Lifecycle callbacks a model can run around single-document writes.
///
/// All methods default to no-ops. A failing `before_*` hook aborts the write;
/// a failing `after_*` hook is reported even though the write already
/// happened.
pub trait Hooks {
    fn before_insert(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn after_insert(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn before_update(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn after_update(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn before_delete(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn after_delete(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Raw documents carry no hooks.
impl Hooks for Document {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl HookPhase {
    pub fn is_before(self) -> bool {
        matches!(
            self,
            HookPhase::BeforeInsert | HookPhase::BeforeUpdate | HookPhase::BeforeDelete
        )
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookPhase::BeforeInsert => "before insert",
            HookPhase::AfterInsert => "after insert",
            HookPhase::BeforeUpdate => "before update",
            HookPhase::AfterUpdate => "after update",
            HookPhase::BeforeDelete => "before delete",
            HookPhase::AfterDelete => "after delete",
        };
        f.write_str(s)
    }
}

pub(crate) fn run<M: Hooks + ?Sized>(model: &mut M, phase: HookPhase) -> Result<(), Error> {
    let result = match phase {
        HookPhase::BeforeInsert => model.before_insert(),
        HookPhase::AfterInsert => model.after_insert(),
        HookPhase::BeforeUpdate => model.before_update(),
        HookPhase::AfterUpdate => model.after_update(),
        HookPhase::BeforeDelete => model.before_delete(),
        HookPhase::AfterDelete => model.after_delete(),
    };
    result.map_err(|source| Error::Hook { phase, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Audited {
        seen: Vec<&'static str>,
    }

    impl Hooks for Audited {
        fn before_insert(&mut self) -> Result<(), BoxError> {
            self.seen.push("before_insert");
            Ok(())
        }

        fn after_delete(&mut self) -> Result<(), BoxError> {
            Err("archive unavailable".into())
        }
    }

    #[test]
    fn dispatches_to_the_named_phase() {
        let mut model = Audited::default();
        run(&mut model, HookPhase::BeforeInsert).unwrap();
        run(&mut model, HookPhase::AfterInsert).unwrap();
        assert_eq!(model.seen, ["before_insert"]);
    }

    #[test]
    fn failures_carry_their_phase() {
        let mut model = Audited::default();
        let err = run(&mut model, HookPhase::AfterDelete).unwrap_err();
        assert!(matches!(err, Error::Hook { phase: HookPhase::AfterDelete, .. }));
        assert!(!HookPhase::AfterDelete.is_before());
    }
}
