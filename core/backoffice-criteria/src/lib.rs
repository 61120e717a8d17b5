//! Query criteria for the backoffice admin API.
//!
//! - [`Criteria`]: pagination, filters, sorting, term, associations,
//!   aggregations, grouping and includes, built with a fluent API
//! - [`Filter`]: the recursive filter tree (`equals`, `equalsAny`,
//!   `contains`, `prefix`, `suffix`, `range`, `not`, `multi`)
//! - [`Sorting`] and [`Aggregation`]: sort keys and aggregation requests
//!
//! Building a criteria never performs I/O. Serializing one with serde yields
//! exactly the JSON body the search endpoints expect, and deserializing a body
//! validates pagination again.
//!
//! ```
//! use backoffice_criteria::{Criteria, SortDirection};
//!
//! let mut criteria = Criteria::paged(1, 25).unwrap();
//! criteria
//!     .add_filter(Criteria::equals("active", true))
//!     .add_sorting(Criteria::sort("name", SortDirection::Asc))
//!     .add_association("manufacturer");
//!
//! let body = serde_json::to_value(&criteria).unwrap();
//! assert_eq!(body["filter"][0]["type"], "equals");
//! ```

mod aggregation;
mod criteria;
mod error;
mod eval;
mod filter;
mod sorting;

pub use aggregation::Aggregation;
pub use criteria::{Criteria, ScoreQuery, TotalCountMode, DEFAULT_LIMIT};
pub use error::{CriteriaError, CriteriaResult};
pub use filter::{Filter, Operator, RangeBounds};
pub use sorting::{SortDirection, Sorting};
