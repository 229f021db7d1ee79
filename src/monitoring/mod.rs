/*!
 * Monitoring Module
 * Tracing setup for heap diagnostics
 */

mod tracer;

pub use tracer::{init_tracing, try_init_tracing, HeapSpan, TraceFormat};
