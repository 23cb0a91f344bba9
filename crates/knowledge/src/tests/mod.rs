//! Pipeline tests against in-process fakes of the three backends.

mod invariants;
