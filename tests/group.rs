use std::collections::HashMap;

use flowpipe::chunk::range::RangeGroupExt;
use flowpipe::error::{Error, Result};
use flowpipe::pipeline::cancel::CancelToken;
use flowpipe::pipeline::chain::from_source;
use flowpipe::pipeline::config::StageOptions;

mod common;
use common::{collected, snapshot, CollectSink};

/// Groups equal characters, keyed in order of first appearance.
fn group_equal(chars: Vec<char>) -> Vec<Vec<char>> {
    let mut order = Vec::new();
    let mut groups: HashMap<char, Vec<char>> = HashMap::new();
    for c in chars {
        groups
            .entry(c)
            .or_insert_with(|| {
                order.push(c);
                Vec::new()
            })
            .push(c);
    }
    order
        .into_iter()
        .filter_map(|c| groups.remove(&c))
        .collect()
}

#[tokio::test]
async fn regrouping_reproduces_reference_segmentation() -> Result<()> {
    let out = collected();
    let pipeline = from_source::<Vec<char>>(1, CancelToken::new())
        .process_many(|chars| Ok(group_equal(chars)), 1)
        .process_many(|group| Ok(group.into_iter().group_by_range(3)), 1)
        .process(|run| Ok(run.into_iter().collect::<String>()), 1)
        .sink(CollectSink::new(out.clone()), StageOptions::new())
        .build()?;

    pipeline.send("fffaasss10abcd264daa".chars().collect()).await?;
    pipeline.complete().await?;

    assert_eq!(
        snapshot(&out).join("-"),
        "fff-aaa-aa-sss-1-0-b-c-dd-2-6-4"
    );
    Ok(())
}

async fn run_group(input: &str, threshold: usize) -> Result<Vec<String>> {
    let out = collected();
    let pipeline = from_source::<char>(4, CancelToken::new())
        .group(|c| *c, threshold)
        .process(|group| Ok(group.into_iter().collect::<String>()), 1)
        .sink(CollectSink::new(out.clone()), StageOptions::new())
        .build()?;

    for c in input.chars() {
        pipeline.send(c).await?;
    }
    pipeline.complete().await?;
    Ok(snapshot(&out))
}

#[tokio::test]
async fn emits_only_groups_reaching_threshold() -> Result<()> {
    let groups = run_group("fffaasss10abcd264daa", 3).await?;

    // `a` fills up on its third occurrence; the trailing `aa`, both `d`s and
    // the single characters never reach the threshold.
    assert_eq!(groups, vec!["fff", "sss", "aaa"]);
    Ok(())
}

#[tokio::test]
async fn threshold_one_emits_every_item_alone() -> Result<()> {
    let groups = run_group("abca", 1).await?;
    assert_eq!(groups, vec!["a", "b", "c", "a"]);
    Ok(())
}

#[tokio::test]
async fn key_restarts_after_emission() -> Result<()> {
    let groups = run_group("aaaaaa", 2).await?;
    assert_eq!(groups, vec!["aa", "aa", "aa"]);
    Ok(())
}

#[tokio::test]
async fn zero_threshold_fails_build() {
    let result = from_source::<char>(1, CancelToken::new())
        .group(|c| *c, 0)
        .to_target(|_| Ok(()), 1)
        .build();

    match result {
        Err(Error::Build { context }) => assert!(context.contains("threshold")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("zero threshold must not build"),
    }
}
