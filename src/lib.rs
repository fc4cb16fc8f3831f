//! Conformer: a conformance harness for source-to-native code generators.
//!
//! A case is a set of named source fragments plus the output the translated,
//! natively built program must print. The harness writes the fragments to a
//! scratch directory, runs the generator under test over them, builds the
//! generated sources with an external toolchain, runs the executable, and
//! compares trimmed output.

pub use crate::config::HarnessConfig;
pub use crate::errors::{HarnessError, Stage, COMPILE_FAILED};
pub use crate::fragments::{Fragment, FragmentSet, MaterializedFile};
pub use crate::harness::{ConformanceCase, ConformanceFailure, Harness, Outcome};
pub use crate::report::FailureReport;
pub use crate::translate::{CommandTranslator, Diagnostics, TranslationOptions, Translator};

pub mod config;
pub mod errors;
pub mod fragments;
pub mod harness;
pub mod logging;
pub mod naming;
pub mod process;
pub mod report;
pub mod suite;
pub mod toolchain;
pub mod translate;
pub mod verify;
