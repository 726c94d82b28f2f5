//! Segment planning: which prompt is active for a given frame

use crate::{Result, SessionError};

/// Resolved prompt schedule for one session.
///
/// Built once by the handshake and never mutated. Segment `s` covers the frames
/// in `switch[s - 1]..switch[s]` (with `switch[-1] = 0` and `switch[len] = ∞`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    switch_frame_indices: Vec<u64>,
    effective_prompts: Vec<String>,
}

impl SegmentPlan {
    /// Build a plan, applying reprompt tail substitution.
    ///
    /// The last `reprompts.len()` prompts are replaced in order by `reprompts`.
    /// Switch indices must be ascending and there must be at least one prompt and
    /// no more reprompts than prompts.
    pub fn new(
        prompts: Vec<String>,
        switch_frame_indices: Vec<u64>,
        reprompts: &[String],
    ) -> Result<Self> {
        if prompts.is_empty() {
            return Err(SessionError::protocol("`prompts` must not be empty"));
        }
        if !switch_frame_indices.is_sorted() {
            return Err(SessionError::protocol(format!(
                "`switch_frame_indices` must be ascending, got {switch_frame_indices:?}"
            )));
        }
        if reprompts.len() > prompts.len() {
            return Err(SessionError::protocol(format!(
                "{} reprompts given for {} prompts",
                reprompts.len(),
                prompts.len()
            )));
        }

        let mut effective_prompts = prompts;
        let keep = effective_prompts.len() - reprompts.len();
        effective_prompts.truncate(keep);
        effective_prompts.extend(reprompts.iter().cloned());

        Ok(Self { switch_frame_indices, effective_prompts })
    }

    /// Segment a frame belongs to: the smallest `s` with `frame_index < switch[s]`,
    /// or `switch.len()` past the last boundary.
    pub fn segment_for_frame(&self, frame_index: u64) -> usize {
        self.switch_frame_indices.partition_point(|&boundary| boundary <= frame_index)
    }

    /// Prompt in effect for a segment, clamped to the last prompt
    pub fn prompt_for_segment(&self, segment_index: usize) -> &str {
        let last = self.effective_prompts.len() - 1;
        &self.effective_prompts[segment_index.min(last)]
    }

    /// Prompt in effect for a frame
    pub fn active_prompt(&self, frame_index: u64) -> &str {
        self.prompt_for_segment(self.segment_for_frame(frame_index))
    }

    /// Number of prompt segments, as reported to the renderer
    pub fn segment_count(&self) -> usize {
        self.effective_prompts.len()
    }

    pub fn switch_frame_indices(&self) -> &[u64] {
        &self.switch_frame_indices
    }

    pub fn effective_prompts(&self) -> &[String] {
        &self.effective_prompts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_segments_switch_at_boundary() {
        let plan = SegmentPlan::new(strings(&["a", "b"]), vec![60], &[]).unwrap();

        assert_eq!(plan.segment_for_frame(0), 0);
        assert_eq!(plan.segment_for_frame(59), 0);
        assert_eq!(plan.segment_for_frame(60), 1);
        assert_eq!(plan.segment_for_frame(119), 1);
        assert_eq!(plan.active_prompt(59), "a");
        assert_eq!(plan.active_prompt(60), "b");
    }

    #[test]
    fn reprompt_replaces_tail() {
        let plan = SegmentPlan::new(strings(&["a", "b"]), vec![60], &strings(&["c"])).unwrap();

        assert_eq!(plan.effective_prompts(), &strings(&["a", "c"])[..]);
        assert_eq!(plan.active_prompt(10), "a");
        assert_eq!(plan.active_prompt(60), "c");
    }

    #[test]
    fn full_reprompt_replaces_everything() {
        let plan =
            SegmentPlan::new(strings(&["a", "b"]), vec![60], &strings(&["x", "y"])).unwrap();
        assert_eq!(plan.effective_prompts(), &strings(&["x", "y"])[..]);
    }

    #[test]
    fn more_boundaries_than_prompts_clamps() {
        let plan = SegmentPlan::new(strings(&["a", "b"]), vec![24, 48, 72, 96], &[]).unwrap();

        assert_eq!(plan.segment_for_frame(100), 4);
        assert_eq!(plan.active_prompt(100), "b");
        assert_eq!(plan.active_prompt(30), "b");
        assert_eq!(plan.segment_count(), 2);
    }

    #[test]
    fn no_boundaries_means_single_segment() {
        let plan = SegmentPlan::new(strings(&["only"]), vec![], &[]).unwrap();
        assert_eq!(plan.segment_for_frame(0), 0);
        assert_eq!(plan.segment_for_frame(u64::MAX), 0);
        assert_eq!(plan.active_prompt(500), "only");
    }

    #[test]
    fn invalid_plans_are_protocol_errors() {
        let unsorted = SegmentPlan::new(strings(&["a", "b", "c"]), vec![60, 30], &[]);
        let empty = SegmentPlan::new(vec![], vec![], &[]);
        let long_reprompts = SegmentPlan::new(strings(&["a"]), vec![], &strings(&["b", "c"]));

        for result in [unsorted, empty, long_reprompts] {
            assert!(matches!(result, Err(SessionError::Protocol { .. })));
        }
    }

    proptest! {
        #[test]
        fn segment_matches_boundaries_and_never_decreases(
            mut switches in prop::collection::vec(0u64..500, 0..8),
            frames in prop::collection::vec(0u64..600, 1..50),
        ) {
            switches.sort_unstable();
            let prompts: Vec<String> = (0..=switches.len()).map(|i| format!("p{i}")).collect();
            let plan = SegmentPlan::new(prompts, switches.clone(), &[]).unwrap();

            let mut frames = frames;
            frames.sort_unstable();
            let mut previous = 0;
            for frame in frames {
                let segment = plan.segment_for_frame(frame);
                let lower = if segment == 0 { 0 } else { switches[segment - 1] };
                prop_assert!(lower <= frame);
                if segment < switches.len() {
                    prop_assert!(frame < switches[segment]);
                }
                prop_assert!(segment >= previous);
                previous = segment;
            }
        }

        #[test]
        fn reprompts_replace_exactly_the_tail(
            prompts in prop::collection::vec("[a-z]{1,6}", 1..8),
            reprompt_seed in prop::collection::vec("[A-Z]{1,6}", 0..8),
        ) {
            let r = reprompt_seed.len().min(prompts.len());
            let reprompts = &reprompt_seed[..r];
            let plan = SegmentPlan::new(prompts.clone(), vec![], reprompts).unwrap();
            let effective = plan.effective_prompts();

            prop_assert_eq!(effective.len(), prompts.len());
            let keep = prompts.len() - r;
            prop_assert_eq!(&effective[..keep], &prompts[..keep]);
            prop_assert_eq!(&effective[keep..], reprompts);
        }
    }
}
