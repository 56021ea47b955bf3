//! The three dispatch policies. Each one drives a [`DeadlineRacer`](crate::racer::DeadlineRacer)
//! over transport attempts and returns the first success or a terminal error.

pub(crate) mod broadcast;
pub(crate) mod hedged;
pub(crate) mod sequential;
