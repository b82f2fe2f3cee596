use super::allocator::DestinationAllocator;
use crate::models::{FileRecord, Move, Plan};
use crate::rules::RuleSet;
use crate::security::PathValidator;

/// Lazy move sequence produced by matching records against a rule set.
///
/// Pulls one record at a time; the only state carried between records lives
/// in the borrowed [`DestinationAllocator`]. Dropping the iterator early is
/// safe and leaves the allocator holding exactly the destinations yielded.
pub struct MoveGenerator<'a, I> {
    records: I,
    rules: &'a RuleSet,
    allocator: &'a mut DestinationAllocator,
    matched: usize,
    unmatched: usize,
}

/// Start a planning pass over `records`.
pub fn generate_moves<'a, I>(
    records: I,
    rules: &'a RuleSet,
    allocator: &'a mut DestinationAllocator,
) -> MoveGenerator<'a, I::IntoIter>
where
    I: IntoIterator<Item = FileRecord>,
{
    MoveGenerator {
        records: records.into_iter(),
        rules,
        allocator,
        matched: 0,
        unmatched: 0,
    }
}

/// Materialize a full plan. Only suitable when the record set fits in memory;
/// stream large sets with [`generate_moves`] instead.
pub fn generate_plan<I>(records: I, rules: &RuleSet, max_collision_attempts: u32) -> Plan
where
    I: IntoIterator<Item = FileRecord>,
{
    let mut allocator = DestinationAllocator::new(max_collision_attempts);
    let moves: Vec<Move> = generate_moves(records, rules, &mut allocator).collect();
    let mut plan = Plan::new(Vec::new(), moves);
    plan.rules = rules.rules().to_vec();
    plan
}

impl<I> MoveGenerator<'_, I> {
    /// Records that matched a rule so far
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Records no rule matched so far
    pub fn unmatched(&self) -> usize {
        self.unmatched
    }

    fn plan_record(&mut self, mut record: FileRecord) -> Option<Move> {
        if record.rel_path.trim().is_empty() {
            return None;
        }
        record.rel_path = match PathValidator::normalize_rel(&record.rel_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping record with unusable path");
                return None;
            }
        };

        let Some(rule) = self.rules.first_match(&record) else {
            self.unmatched += 1;
            tracing::debug!(path = %record.rel_path, "No rule matched");
            return None;
        };
        self.matched += 1;

        let destination = rule.render(&record);
        if destination == record.rel_path {
            // Already in place; hold the spot so nothing else lands on it
            self.allocator.allocate(&destination);
            return None;
        }

        let new_rel = self.allocator.allocate(&destination)?;
        if new_rel == record.rel_path {
            return None;
        }

        Some(Move::new(record.rel_path, new_rel, rule.name.clone()))
    }
}

impl<I> Iterator for MoveGenerator<'_, I>
where
    I: Iterator<Item = FileRecord>,
{
    type Item = Move;

    fn next(&mut self) -> Option<Move> {
        loop {
            let record = self.records.next()?;
            if let Some(mv) = self.plan_record(record) {
                return Some(mv);
            }
        }
    }
}
