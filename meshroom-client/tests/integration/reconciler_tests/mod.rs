mod test_answer_timeout;
mod test_cooldown;
mod test_stale_events;
