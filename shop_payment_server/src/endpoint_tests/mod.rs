mod helpers;
mod reconciliation;
