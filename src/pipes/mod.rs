//! Built-in pipes.
//!
//! | name               | direction | effect                                   |
//! |--------------------|-----------|------------------------------------------|
//! | `paginate`         | in        | stashes `{page, size}`                   |
//! | `sorting`          | in        | stashes `{field, order}`, checks ALLOW   |
//! | `rest_wrapout`     | in        | picks WRAPOUT / WRAPERR by verb          |
//! | `response_support` | out       | page → list + paginator context          |

pub mod paginate;
pub mod response_support;
pub mod rest_wrapout;
pub mod sorting;

pub use paginate::Paginate;
pub use response_support::ResponseSupport;
pub use rest_wrapout::RestWrapout;
pub use sorting::Sorting;
