// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressgang Print: resilient IPP transport to local and remote spoolers, and
// the builder that turns a print request into a printer-specific Print-Job.
// Domain types, rule tables and configuration live in `pressgang-core`; the
// wire codec lives in `pressgang-ipp`.

pub mod breaker;
pub mod builder;
pub mod endpoint;
pub mod media;
pub mod rules;
pub mod transport;

pub use breaker::{Admission, BreakerSnapshot, CircuitBreaker, CircuitState, DeferredError};
pub use builder::{BuiltPrintJob, PrintJobBuilder, SkipReason, SkippedOption, build_print_job_request};
pub use endpoint::{Endpoint, EndpointClass};
pub use media::MediaSelection;
pub use rules::RuleChain;
pub use transport::{IppResponse, IppTransport};
