// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod array;
pub mod array_iterator;
pub mod async_function;
pub mod builtin_function;
pub mod error;
pub mod generator_objects;
pub mod global_object;
pub mod math_object;
pub mod object_objects;
pub mod promise;
pub mod promise_abstract_operations;
pub mod string_objects;
