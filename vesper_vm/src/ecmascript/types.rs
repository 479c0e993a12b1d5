// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod function;
pub mod object;
pub mod string;
pub mod value;

pub use function::Function;
pub use object::{PropertyDescriptor, PropertyKey};
pub use value::{Symbol, Value};
