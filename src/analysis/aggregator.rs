//! Transcript aggregation and statistics.
//!
//! This module condenses the member outputs of a run into the views used by
//! reports and the terminal summary.

use crate::models::{AgentOutput, AgentSection, Member};
use std::collections::HashMap;

/// Group outputs by member, keeping run order within each member.
pub fn group_by_member(outputs: &[AgentOutput]) -> HashMap<Member, Vec<&AgentOutput>> {
    let mut grouped: HashMap<Member, Vec<&AgentOutput>> = HashMap::new();

    for output in outputs {
        grouped.entry(output.member).or_default().push(output);
    }

    grouped
}

/// Members in the order they first acted.
pub fn members_in_run_order(outputs: &[AgentOutput]) -> Vec<Member> {
    let mut members = Vec::new();

    for output in outputs {
        if !members.contains(&output.member) {
            members.push(output.member);
        }
    }

    members
}

/// The most recent output of every member, in first-acted order.
pub fn latest_by_member(outputs: &[AgentOutput]) -> Vec<&AgentOutput> {
    let grouped = group_by_member(outputs);

    members_in_run_order(outputs)
        .into_iter()
        .filter_map(|member| grouped.get(&member).and_then(|o| o.last().copied()))
        .collect()
}

/// Number of member turns taken.
#[cfg(test)]
pub fn total_trials(outputs: &[AgentOutput]) -> usize {
    outputs.len()
}

/// Turns taken per member.
pub fn trials_by_member(outputs: &[AgentOutput]) -> HashMap<Member, usize> {
    let mut counts: HashMap<Member, usize> = HashMap::new();

    for output in outputs {
        *counts.entry(output.member).or_default() += 1;
    }

    counts
}

/// Report sections: one per member with its latest answer.
pub fn build_sections(outputs: &[AgentOutput]) -> Vec<AgentSection> {
    let counts = trials_by_member(outputs);

    latest_by_member(outputs)
        .into_iter()
        .map(|output| AgentSection {
            member: output.member,
            trials: counts.get(&output.member).copied().unwrap_or(0),
            content: output.content.clone(),
        })
        .collect()
}
