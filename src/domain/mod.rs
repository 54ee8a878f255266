pub mod email_entry;
pub mod entry_update;
pub mod page_request;
pub mod subscriber_email;
