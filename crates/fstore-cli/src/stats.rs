//! `wc` and `freq-words`.

use std::io::Write;

use anyhow::Context;
use fstore_client::StoreClient;
use fstore_core::protocol::WordCountPair;

pub async fn run_word_count(client: &StoreClient, out: &mut impl Write) -> anyhow::Result<u8> {
    let count = client.word_count().await.context("counting words")?;
    writeln!(out, "{count}")?;
    Ok(0)
}

pub async fn run_freq_words(client: &StoreClient, out: &mut impl Write) -> anyhow::Result<u8> {
    let pairs = client
        .frequent_words()
        .await
        .context("fetching frequent words")?;
    write_pairs(&pairs, out)?;
    Ok(0)
}

/// One `<count>. <word>` line per pair, in server order.
fn write_pairs(pairs: &[WordCountPair], out: &mut impl Write) -> std::io::Result<()> {
    for pair in pairs {
        writeln!(out, "{}. {}", pair.count, pair.word)?;
    }
    Ok(())
}
