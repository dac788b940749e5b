// SPDX-License-Identifier: Apache-2.0

//! The 6 concrete end-to-end scenarios from the testable-properties list:
//! one module per scenario, each building its own minimal dataset.

#[path = "scenarios/array_membership.rs"]
mod array_membership;
#[path = "scenarios/colocation_at.rs"]
mod colocation_at;
#[path = "scenarios/descendant_has.rs"]
mod descendant_has;
#[path = "scenarios/pipeline.rs"]
mod pipeline;
#[path = "scenarios/refs_unresolved.rs"]
mod refs_unresolved;
#[path = "scenarios/type_and_field.rs"]
mod type_and_field;
