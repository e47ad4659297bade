pub mod repeating_task;
