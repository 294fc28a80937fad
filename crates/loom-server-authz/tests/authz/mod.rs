// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod concurrency;
mod propagation;
mod properties;
mod resolution;
mod support;
