// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pronounceable pool-local agent names.
//!
//! Two-word `adjective_animal` identifiers, collision-avoided against the
//! caller-supplied taken set (live agents plus the recent ring).

use std::collections::HashSet;

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brave", "bright", "calm", "clever", "crimson", "curious", "dusty", "eager",
    "fierce", "gentle", "ghost", "gilded", "glad", "golden", "hazel", "humble", "iron", "ivory",
    "jade", "keen", "lively", "lucid", "lunar", "mellow", "misty", "noble", "ochre", "pale",
    "proud", "quiet", "rapid", "rustic", "sable", "sage", "silent", "silver", "sly", "solar",
    "steady", "stormy", "swift", "tidal", "umber", "vivid", "wild", "witty",
];

const ANIMALS: &[&str] = &[
    "badger", "bison", "crane", "crow", "deer", "dingo", "falcon", "ferret", "finch", "fox",
    "gecko", "hare", "hawk", "heron", "hound", "ibis", "jackal", "koala", "lemur", "lynx",
    "marmot", "marten", "mole", "moose", "newt", "otter", "owl", "panda", "pika", "puffin",
    "quail", "rat", "raven", "robin", "seal", "shrew", "skink", "sparrow", "stoat", "swan",
    "tapir", "tern", "toad", "viper", "vole", "weasel", "wolf", "wren",
];

/// Generate a fresh two-word name not present in `taken`.
///
/// Falls back to a uuid-suffixed name if the random picks keep colliding
/// (only plausible when the taken set approaches the combination space).
pub(crate) fn generate(taken: &HashSet<String>) -> String {
    for _ in 0..32 {
        let bytes = *uuid::Uuid::new_v4().as_bytes();
        let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
        let animal = ANIMALS[bytes[1] as usize % ANIMALS.len()];
        let name = format!("{adjective}_{animal}");
        if !taken.contains(&name) {
            return name;
        }
    }
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("agent_{}", &uuid[..8])
}

#[cfg(test)]
#[path = "namegen_tests.rs"]
mod tests;
