// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod members;
pub mod expenses;
pub mod meals;
pub mod guests;
pub mod duty;
pub mod summary;
pub mod payments;
pub mod invoice;
pub mod exporter;
pub mod notify;
pub mod settings;
pub mod remote;
pub mod doctor;
