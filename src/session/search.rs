use super::{SessionError, UserId};
use serde::Serialize;

/// Where a search stands, for display. `remaining_steps` assumes a perfectly balanced
/// remaining search, so it is an estimate rather than an exact count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current_probe: u64,
    pub total_frames: u64,
    pub steps_taken: u32,
    pub remaining_steps: u32,
    pub progress_percent: u8,
}

impl Progress {
    /// Estimated number of probes for the whole search.
    pub fn estimated_total_steps(&self) -> u32 {
        self.steps_taken + self.remaining_steps
    }
}

/// One user's binary search over frame indices `0..total_frames`.
///
/// The search predicate ("has the launch happened by this frame?") is supplied one answer at a
/// time through [`submit_answer`](Self::submit_answer). Once the bounds cross, the session is
/// finished and the found frame is fixed for good.
#[derive(Debug, Clone)]
pub struct SearchSession {
    user_id: UserId,
    total_frames: u64,
    // Signed: a "yes" on probe 0 moves the upper bound to -1.
    lower_bound: i64,
    upper_bound: i64,
    current_probe: i64,
    steps_taken: u32,
    found_frame: Option<u64>,
}

impl SearchSession {
    /// Start a search and compute the first probe.
    pub fn new(user_id: UserId, total_frames: u64) -> Result<Self, SessionError> {
        let upper_bound = i64::try_from(total_frames)
            .ok()
            .filter(|n| *n >= 1)
            .map(|n| n - 1)
            .ok_or(SessionError::InvalidArgument { total_frames })?;

        let mut session = Self {
            user_id,
            total_frames,
            lower_bound: 0,
            upper_bound,
            current_probe: 0,
            steps_taken: 0,
            found_frame: None,
        };
        session.advance_probe();
        Ok(session)
    }

    /// Record whether the launch is visible on the current probe.
    ///
    /// Returns `true` when this answer finished the search.
    pub fn submit_answer(&mut self, has_occurred: bool) -> Result<bool, SessionError> {
        if self.is_complete() {
            return Err(SessionError::InvalidState {
                user_id: self.user_id,
            });
        }

        if has_occurred {
            self.upper_bound = self.current_probe - 1;
        } else {
            self.lower_bound = self.current_probe + 1;
        }

        if self.lower_bound > self.upper_bound {
            // An all-"no" search ends one past the last frame; report the last frame instead.
            let last = self.total_frames - 1;
            self.found_frame = Some((self.lower_bound as u64).min(last));
            return Ok(true);
        }

        self.advance_probe();
        Ok(false)
    }

    fn advance_probe(&mut self) {
        self.current_probe = self.lower_bound + (self.upper_bound - self.lower_bound) / 2;
        self.steps_taken += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.found_frame.is_some()
    }

    pub fn progress(&self) -> Progress {
        let steps_taken = self.steps_taken;
        let remaining_steps = self.remaining_steps();
        let denominator = u64::from(steps_taken) + u64::from(remaining_steps);
        let progress_percent = if denominator == 0 {
            100
        } else {
            let pct = (100.0 * f64::from(steps_taken) / denominator as f64).round();
            pct.min(100.0) as u8
        };

        Progress {
            current_probe: self.current_probe(),
            total_frames: self.total_frames,
            steps_taken,
            remaining_steps,
            progress_percent,
        }
    }

    fn remaining_steps(&self) -> u32 {
        if self.is_complete() {
            return 0;
        }
        let width = (self.upper_bound - self.lower_bound + 1) as u64;
        let balanced = if width > 1 {
            u64::BITS - (width - 1).leading_zeros()
        } else {
            0
        };
        // The probe on screen still needs its answer.
        balanced.max(1)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Frame index currently shown to the user.
    pub fn current_probe(&self) -> u64 {
        self.current_probe as u64
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    /// First frame showing the launch, once the search has finished.
    pub fn found_frame(&self) -> Option<u64> {
        self.found_frame
    }

    /// Inclusive `(lower, upper)` bounds still consistent with every answer so far.
    pub fn bounds(&self) -> (i64, i64) {
        (self.lower_bound, self.upper_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId(42);

    /// Drive a session with a threshold oracle; returns (found_frame, answers submitted).
    fn run_with_threshold(total_frames: u64, launch_at: Option<u64>) -> (u64, u32) {
        let mut session = SearchSession::new(USER, total_frames).unwrap();
        let mut answers = 0;
        loop {
            let probe = session.current_probe();
            let launched = launch_at.is_some_and(|k| probe >= k);
            answers += 1;
            if session.submit_answer(launched).unwrap() {
                return (session.found_frame().unwrap(), answers);
            }
            assert!(answers <= 64, "search did not converge");
        }
    }

    fn max_answers(total_frames: u64) -> u32 {
        // floor(log2(n)) + 1
        u64::BITS - total_frames.leading_zeros()
    }

    #[test]
    fn rejects_empty_video() {
        let err = SearchSession::new(USER, 0).unwrap_err();
        assert_eq!(err, SessionError::InvalidArgument { total_frames: 0 });
    }

    #[test]
    fn rejects_unaddressable_frame_count() {
        assert!(matches!(
            SearchSession::new(USER, u64::MAX),
            Err(SessionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn first_probe_is_computed_on_construction() {
        let session = SearchSession::new(USER, 8).unwrap();
        assert_eq!(session.current_probe(), 3);
        assert_eq!(session.steps_taken(), 1);
        assert_eq!(session.bounds(), (0, 7));
        assert!(!session.is_complete());
        assert_eq!(session.found_frame(), None);
        assert_eq!(session.user_id(), USER);
    }

    #[test]
    fn eight_frames_with_launch_at_five() {
        let mut session = SearchSession::new(USER, 8).unwrap();

        assert_eq!(session.current_probe(), 3);
        assert!(!session.submit_answer(false).unwrap());
        assert_eq!(session.bounds(), (4, 7));

        assert_eq!(session.current_probe(), 5);
        assert!(!session.submit_answer(true).unwrap());
        assert_eq!(session.bounds(), (4, 4));

        assert_eq!(session.current_probe(), 4);
        assert!(session.submit_answer(false).unwrap());

        assert_eq!(session.found_frame(), Some(5));
        assert_eq!(session.steps_taken(), 3);
    }

    #[test]
    fn all_no_clamps_to_last_frame() {
        for total in [1, 2, 3, 7, 8, 9, 61_696] {
            let (found, answers) = run_with_threshold(total, None);
            assert_eq!(found, total - 1, "total={total}");
            assert!(answers <= max_answers(total), "total={total} answers={answers}");
        }
    }

    #[test]
    fn all_yes_finds_frame_zero() {
        for total in [1, 2, 5, 8, 1000] {
            assert_eq!(run_with_threshold(total, Some(0)).0, 0, "total={total}");
        }
    }

    #[test]
    fn single_frame_finishes_after_one_answer() {
        for answer in [true, false] {
            let mut session = SearchSession::new(USER, 1).unwrap();
            assert_eq!(session.current_probe(), 0);
            assert!(session.submit_answer(answer).unwrap());
            assert_eq!(session.found_frame(), Some(0));
        }
    }

    #[test]
    fn finished_session_rejects_answers_without_mutating() {
        let mut session = SearchSession::new(USER, 4).unwrap();
        while !session.submit_answer(true).unwrap() {}
        let bounds = session.bounds();
        let found = session.found_frame();

        for answer in [true, false] {
            assert_eq!(
                session.submit_answer(answer),
                Err(SessionError::InvalidState { user_id: USER })
            );
        }
        assert_eq!(session.bounds(), bounds);
        assert_eq!(session.found_frame(), found);
    }

    #[test]
    fn progress_estimates_balanced_search() {
        let session = SearchSession::new(USER, 8).unwrap();
        let progress = session.progress();
        assert_eq!(progress.current_probe, 3);
        assert_eq!(progress.total_frames, 8);
        assert_eq!(progress.steps_taken, 1);
        assert_eq!(progress.remaining_steps, 3);
        assert_eq!(progress.progress_percent, 25);
        assert_eq!(progress.estimated_total_steps(), 4);
    }

    #[test]
    fn collapsed_bounds_still_wait_for_one_answer() {
        let mut session = SearchSession::new(USER, 8).unwrap();
        session.submit_answer(false).unwrap();
        session.submit_answer(true).unwrap();
        assert_eq!(session.bounds(), (4, 4));

        let progress = session.progress();
        assert_eq!(progress.remaining_steps, 1);
        assert_eq!(progress.progress_percent, 75);

        session.submit_answer(false).unwrap();
        assert_eq!(session.progress().progress_percent, 100);
    }

    #[test]
    fn progress_counts_pending_answer_on_last_candidate() {
        let session = SearchSession::new(USER, 1).unwrap();
        let progress = session.progress();
        assert_eq!(progress.remaining_steps, 1);
        assert_eq!(progress.progress_percent, 50);
    }

    #[test]
    fn progress_is_monotonic_and_hits_100_only_when_finished() {
        for total in [2, 8, 100, 61_696] {
            for launch_at in [Some(0), Some(total / 3), Some(total - 1), None] {
                let mut session = SearchSession::new(USER, total).unwrap();
                let mut last = session.progress().progress_percent;
                assert!(last < 100);
                loop {
                    let launched = launch_at.is_some_and(|k| session.current_probe() >= k);
                    let finished = session.submit_answer(launched).unwrap();
                    let pct = session.progress().progress_percent;
                    assert!(pct >= last, "total={total} {last} -> {pct}");
                    assert_eq!(pct == 100, finished);
                    last = pct;
                    if finished {
                        assert_eq!(session.progress().remaining_steps, 0);
                        break;
                    }
                }
            }
        }
    }

    mod proptest_convergence {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn monotonic_oracle_finds_threshold(
                (total, launch_at) in (1u64..200_000).prop_flat_map(|n| (Just(n), 0..n))
            ) {
                let (found, answers) = run_with_threshold(total, Some(launch_at));
                prop_assert_eq!(found, launch_at);
                prop_assert!(answers <= max_answers(total));
            }

            #[test]
            fn probe_stays_within_bounds(
                total in 1u64..10_000,
                answers in proptest::collection::vec(any::<bool>(), 1..40)
            ) {
                let mut session = SearchSession::new(USER, total).unwrap();
                for answer in answers {
                    if session.is_complete() {
                        prop_assert!(session.submit_answer(answer).is_err());
                        continue;
                    }
                    let (lo, hi) = session.bounds();
                    let probe = session.current_probe() as i64;
                    prop_assert!(lo <= probe && probe <= hi);
                    session.submit_answer(answer).unwrap();
                }
                let (lo, hi) = session.bounds();
                prop_assert_eq!(lo > hi, session.is_complete());
                prop_assert!(session.found_frame().map_or(true, |f| f < total));
            }
        }
    }
}
