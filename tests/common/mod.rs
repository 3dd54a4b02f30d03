// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Shared test-only logging setup.

use std::io;
use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `fern` dispatcher writing to stdout at `Debug` level, once per test binary.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = fern::Dispatch::new()
            .level(log::LevelFilter::Debug)
            .chain(io::stdout())
            .apply();
    });
}
