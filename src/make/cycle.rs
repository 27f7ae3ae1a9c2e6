//! Cycle reporting for the resolver.

/// Extract the cycle closed by re-entering `node` from the resolution
/// `stack`, in canonical form.
pub(super) fn cycle_from_stack(stack: &[String], node: &str) -> Vec<String> {
    let start = stack
        .iter()
        .position(|entry| entry == node)
        .unwrap_or_default();
    let mut cycle: Vec<String> = stack.iter().skip(start).cloned().collect();
    cycle.push(node.to_owned());
    canonicalize_cycle(cycle)
}

/// Rotate a closed cycle so it starts, and ends, at its smallest name.
fn canonicalize_cycle(mut cycle: Vec<String>) -> Vec<String> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}
