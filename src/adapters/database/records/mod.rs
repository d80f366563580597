mod message_event;

pub use message_event::MessageEventRecord;
