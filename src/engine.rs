use crate::types::{ChangeEvent, Direction, LineDelta, Side, Snapshot, TeamLine};

/// Absolute tolerance for price comparisons. Feed prices are quoted in
/// cents, so anything below this is rounding noise.
pub const PRICE_EPSILON: f64 = 1e-6;

/// Classify how one side of a team's line moved.
///
/// A team absent from the previous snapshot is compared against a zeroed
/// line, so any nonzero price on a newly listed team reads as `Up`.
pub fn compute_delta(old: Option<&TeamLine>, new: &TeamLine, side: Side) -> LineDelta {
    let old_price = old.map(|line| line.price(side)).unwrap_or(0.0);
    let new_price = new.price(side);

    let direction = if new_price - old_price > PRICE_EPSILON {
        Direction::Up
    } else if old_price - new_price > PRICE_EPSILON {
        Direction::Down
    } else {
        Direction::Flat
    };

    LineDelta {
        direction,
        price: new_price,
        quantity: new.size(side),
    }
}

/// A line with both bid and ask at zero has been cleared (the game started).
pub fn is_cleared(line: &TeamLine) -> bool {
    line.bid.abs() <= PRICE_EPSILON && line.ask.abs() <= PRICE_EPSILON
}

/// Decide whether a team's change is worth a notification.
///
/// Cleared lines are never reported. Otherwise at least one side must have
/// moved.
pub fn should_notify(new_line: &TeamLine, bid_delta: &LineDelta, ask_delta: &LineDelta) -> bool {
    if is_cleared(new_line) {
        return false;
    }
    bid_delta.direction != Direction::Flat || ask_delta.direction != Direction::Flat
}

/// Diff two consecutive snapshots into the change events to publish.
///
/// Events follow the iteration order of `new`. Teams only present in `old`
/// are ignored.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> Vec<ChangeEvent> {
    new.iter()
        .filter_map(|(team, line)| {
            let old_line = old.get(team);
            let bid_delta = compute_delta(old_line, line, Side::Bid);
            let ask_delta = compute_delta(old_line, line, Side::Ask);

            should_notify(line, &bid_delta, &ask_delta).then(|| ChangeEvent {
                team: team.to_string(),
                bid_delta,
                ask_delta,
            })
        })
        .collect()
}
