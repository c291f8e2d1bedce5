// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Splitting and reconciliation rules. Nothing in here touches the database;
//! callers fetch a snapshot, run these functions, and persist the result.

pub mod balance;
pub mod distribution;
pub mod migration;
pub mod notifications;
pub mod payments;
pub mod polls;
pub mod shared;
pub mod split;
pub mod tracker;
