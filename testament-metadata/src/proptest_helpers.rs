// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{SourceLocation, Tag, TestId};
use proptest::prelude::*;
use smol_str::SmolStr;

fn identifier() -> impl Strategy<Value = SmolStr> {
    "[A-Za-z][A-Za-z0-9_]{0,8}".prop_map(SmolStr::new)
}

impl Arbitrary for SourceLocation {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        ("[a-z]{1,6}\\.rs", 1..500u32, 1..80u32)
            .prop_map(|(file, line, column)| SourceLocation::new(file, line, column))
            .boxed()
    }
}

impl Arbitrary for TestId {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (
            identifier(),
            prop::collection::vec(identifier(), 0..4),
            prop::option::of(any::<SourceLocation>()),
        )
            .prop_map(|(module, components, source_location)| TestId {
                module,
                components,
                source_location,
            })
            .boxed()
    }
}

impl Arbitrary for Tag {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        identifier().prop_map(Tag::new).boxed()
    }
}
