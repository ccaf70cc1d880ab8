use bot_commons::*;

fn main() {
    start_everything("WARN,anon_confess_bot=debug", anon_confess_bot::entry());
}
