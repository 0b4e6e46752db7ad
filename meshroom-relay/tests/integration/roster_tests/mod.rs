mod test_roster_on_disconnect;
mod test_roster_refresh;
mod test_three_members_join;
