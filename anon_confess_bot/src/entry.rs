use std::{fs, sync::Arc};
use teloxide::{dptree::deps, prelude::*};

use crate::{
    handlers::{handle_callback_query, handle_message},
    ledger::LedgerStore,
    Config, CONFIG_PATH,
};

/// # Panics
///
/// Panics if there's no key file, the config is broken, or the ledger can't be loaded.
pub async fn entry() {
    log::info!("ASYNC WOOOO");
    let key = fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .expect("Could not load bot key file!");

    let config = Config::load(CONFIG_PATH).unwrap_or_else(|e| panic!("Bad config: {e}"));
    log::info!("Posting confessions into chat {}", config.channel_id);

    let store = LedgerStore::open(&config.ledger_path)
        .await
        .unwrap_or_else(|e| panic!("Could not open the ledger: {e}"));

    let store = Arc::new(store);
    let config = Arc::new(config);

    let bot = Bot::new(key.trim());

    match bot.get_me().await {
        Ok(me) => log::info!("Running as @{} (userid {})", me.username(), me.id),
        Err(e) => log::warn!("Could not fetch info about the bot itself: {e}"),
    }

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![store, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
