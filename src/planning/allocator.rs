use std::collections::{HashMap, HashSet};

/// Default ceiling on suffix attempts for a single destination
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100_000;

/// Hands out destination paths that are unique within one planning pass.
///
/// When a candidate is taken, a numeric suffix is appended to the filename
/// stem (`dir/name_1.ext`, `dir/name_2.ext`, ...). The next counter for each
/// base path is cached, so repeated collisions on the same base resume where
/// the previous one stopped instead of probing from 1 again.
///
/// Owned by a single planning call and passed by reference; never shared
/// between concurrent planners.
#[derive(Debug, Clone)]
pub struct DestinationAllocator {
    seen: HashSet<String>,
    next_counter: HashMap<String, u32>,
    max_attempts: u32,
}

impl Default for DestinationAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl DestinationAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            seen: HashSet::new(),
            next_counter: HashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Claim `candidate` or its smallest free suffixed variant.
    ///
    /// Returns `None` if no free variant was found within the attempt ceiling.
    pub fn allocate(&mut self, candidate: &str) -> Option<String> {
        if self.seen.insert(candidate.to_string()) {
            return Some(candidate.to_string());
        }

        let (parent, stem, ext) = split_name(candidate);
        let start = self.next_counter.get(candidate).copied().unwrap_or(1);

        for counter in start..start.saturating_add(self.max_attempts) {
            let suffixed = match parent {
                Some(parent) => format!("{}/{}_{}{}", parent, stem, counter, ext),
                None => format!("{}_{}{}", stem, counter, ext),
            };
            if self.seen.insert(suffixed.clone()) {
                self.next_counter
                    .insert(candidate.to_string(), counter.saturating_add(1));
                return Some(suffixed);
            }
        }

        tracing::warn!(
            destination = %candidate,
            attempts = self.max_attempts,
            "Collision resolution gave up; skipping record"
        );
        None
    }

    /// Whether a destination has already been handed out
    pub fn contains(&self, destination: &str) -> bool {
        self.seen.contains(destination)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Split `dir/stem.ext` into (`Some(dir)`, `stem`, `.ext`).
///
/// A leading dot is part of the stem, so `.bashrc` has no extension.
fn split_name(path: &str) -> (Option<&str>, &str, &str) {
    let (parent, name) = match path.rsplit_once('/') {
        Some((parent, name)) => (Some(parent), name),
        None => (None, path),
    };
    match name.rfind('.') {
        Some(idx) if idx > 0 => (parent, &name[..idx], &name[idx..]),
        _ => (parent, name, ""),
    }
}
