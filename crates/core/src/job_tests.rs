// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn happy_path_graph_is_legal() {
    transition(JobStatus::Pending, JobStatus::Scheduled).unwrap();
    transition(JobStatus::Scheduled, JobStatus::Running).unwrap();
    transition(JobStatus::Running, JobStatus::Completed).unwrap();
}

#[test]
fn retry_cycle_is_legal() {
    transition(JobStatus::Running, JobStatus::Failed).unwrap();
    transition(JobStatus::Failed, JobStatus::Retrying).unwrap();
    transition(JobStatus::Retrying, JobStatus::Scheduled).unwrap();
}

#[test]
fn approval_gate_round_trips() {
    transition(JobStatus::Running, JobStatus::WaitingForApproval).unwrap();
    transition(JobStatus::WaitingForApproval, JobStatus::Running).unwrap();
    transition(JobStatus::WaitingForApproval, JobStatus::Failed).unwrap();
}

#[test]
fn dead_letter_only_from_failed() {
    transition(JobStatus::Failed, JobStatus::DeadLetter).unwrap();
    assert!(transition(JobStatus::Running, JobStatus::DeadLetter).is_err());
}

#[test]
fn terminal_states_are_closed() {
    for terminal in [JobStatus::Completed, JobStatus::TimedOut, JobStatus::DeadLetter] {
        assert!(terminal.is_terminal());
        for to in [
            JobStatus::Pending,
            JobStatus::Scheduled,
            JobStatus::Running,
            JobStatus::WaitingForApproval,
            JobStatus::Retrying,
            JobStatus::Failed,
            JobStatus::Completed,
            JobStatus::TimedOut,
            JobStatus::DeadLetter,
        ] {
            assert!(transition(terminal, to).is_err(), "{terminal} should have no outgoing edges");
        }
    }
}

#[test]
fn only_running_may_enter_waiting_for_approval() {
    for from in [
        JobStatus::Pending,
        JobStatus::Scheduled,
        JobStatus::WaitingForApproval,
        JobStatus::Retrying,
        JobStatus::Failed,
    ] {
        assert!(transition(from, JobStatus::WaitingForApproval).is_err());
    }
}

#[test]
fn error_category_retry_policy_matches_spec() {
    assert!(ErrorCategory::Transient.is_retryable());
    assert!(ErrorCategory::Resource.is_retryable());
    assert!(!ErrorCategory::Timeout.is_retryable());
    assert!(!ErrorCategory::Permanent.is_retryable());
    assert!(!ErrorCategory::Permanent.counts_toward_breaker());
}
