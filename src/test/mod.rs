mod engine;
mod mm1;
mod preempt;
mod server;
mod support;
mod wait_queue;
