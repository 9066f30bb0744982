use clausecheck_utils::error::ReviewError;

use crate::analyzer::AnalysisOutcome;
use crate::model::{Checklist, Finding, ReviewBrief, Section, Stage};

/// Mutable state of one run, owned by a single orchestrator invocation.
///
/// The stage only moves forward along the success path or into `Failed`,
/// which is absorbing.
#[derive(Debug)]
pub struct RunState {
    stage: Stage,
    brief: ReviewBrief,
    sections: Vec<Section>,
    checklist: Option<Checklist>,
    analysis: Option<AnalysisOutcome>,
}

impl RunState {
    #[must_use]
    pub fn new(brief: ReviewBrief) -> Self {
        Self {
            stage: Stage::Structuring,
            brief,
            sections: Vec::new(),
            checklist: None,
            analysis: None,
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn brief(&self) -> &ReviewBrief {
        &self.brief
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn checklist(&self) -> Option<&Checklist> {
        self.checklist.as_ref()
    }

    #[must_use]
    pub fn analysis(&self) -> Option<&AnalysisOutcome> {
        self.analysis.as_ref()
    }

    /// Findings gathered so far, empty before analysis finished.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        self.analysis.as_ref().map_or(&[], |a| a.findings.as_slice())
    }

    /// Move to `next`, which must directly follow the current stage.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Internal` for any other transition.
    pub fn advance(&mut self, next: Stage) -> Result<(), ReviewError> {
        if self.stage.next() != Some(next) {
            return Err(ReviewError::Internal(format!(
                "invalid stage transition {} -> {}",
                self.stage, next
            )));
        }
        self.stage = next;
        Ok(())
    }

    /// Enter `Failed` and return the stage in which the failure happened.
    pub fn fail(&mut self) -> Stage {
        let failed_in = self.stage;
        self.stage = Stage::Failed;
        failed_in
    }

    pub(crate) fn record_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
    }

    pub(crate) fn record_checklist(&mut self, checklist: Checklist) {
        self.checklist = Some(checklist);
    }

    pub(crate) fn record_analysis(&mut self, analysis: AnalysisOutcome) {
        self.analysis = Some(analysis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Identity;

    fn state() -> RunState {
        RunState::new(ReviewBrief::new(Identity::SecondParty, "租赁合同", Vec::new()))
    }

    #[test]
    fn test_success_path_in_order() {
        let mut state = state();
        for next in [Stage::Planning, Stage::Analyzing, Stage::Assembling, Stage::Done] {
            state.advance(next).unwrap();
            assert_eq!(state.stage(), next);
        }
        assert!(state.stage().is_terminal());
    }

    #[test]
    fn test_skipping_or_repeating_is_internal_error() {
        let mut state = state();
        assert!(matches!(
            state.advance(Stage::Analyzing),
            Err(ReviewError::Internal(_))
        ));
        state.advance(Stage::Planning).unwrap();
        assert!(state.advance(Stage::Planning).is_err());
        assert!(state.advance(Stage::Structuring).is_err());
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut state = state();
        state.advance(Stage::Planning).unwrap();
        assert_eq!(state.fail(), Stage::Planning);
        assert_eq!(state.stage(), Stage::Failed);
        assert!(state.advance(Stage::Analyzing).is_err());
        assert!(state.advance(Stage::Done).is_err());
    }

    #[test]
    fn test_findings_empty_before_analysis() {
        let state = state();
        assert!(state.findings().is_empty());
        assert!(state.checklist().is_none());
        assert_eq!(state.brief().contract_type, "租赁合同");
    }
}
