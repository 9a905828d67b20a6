/*!
 * Monitoring
 * Tracing setup and system reports
 */

mod report;
mod tracer;

pub use report::SystemReport;
pub use tracer::{init_tracing, span_operation, OperationSpan};
