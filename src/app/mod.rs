// Application layer: turning user input into requests and results into
// reports.

pub mod report;
pub mod shopping_list;
