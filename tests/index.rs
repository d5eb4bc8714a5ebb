use byteorder::{LittleEndian, WriteBytesExt};
use ept::prelude::*;
use ept::resource::memory::MemoryClient;
use glam::DVec3;
use serde_json::json;
use std::sync::Arc;

fn manifest() -> serde_json::Value {
    json!({
        "version": "1.0.0",
        "dataType": "binary",
        "hierarchyType": "json",
        "span": 256,
        "points": 3,
        "srs": { "wkt": "", "authority": "EPSG", "horizontal": "3857" },
        "bounds": [100, 200, 0, 164, 264, 64],
        "boundsConforming": [101, 202, 1, 150, 250, 30],
        "schema": [
            { "name": "X", "type": "signed", "size": 4, "scale": 0.01, "offset": 100,
              "minimum": 101.0, "maximum": 150.0 },
            { "name": "Y", "type": "signed", "size": 4, "scale": 0.01, "offset": 200 },
            { "name": "Z", "type": "signed", "size": 4, "scale": 0.01, "offset": 0 },
            { "name": "Intensity", "type": "unsigned", "size": 2 },
            { "name": "Classification", "type": "unsigned", "size": 1,
              "counts": [ { "value": 2, "count": 2 }, { "value": 5, "count": 1 } ] }
        ]
    })
}

fn record(buf: &mut Vec<u8>, x: i32, y: i32, z: i32, intensity: u16, class: u8) {
    buf.write_i32::<LittleEndian>(x).unwrap();
    buf.write_i32::<LittleEndian>(y).unwrap();
    buf.write_i32::<LittleEndian>(z).unwrap();
    buf.write_u16::<LittleEndian>(intensity).unwrap();
    buf.write_u8(class).unwrap();
}

fn dataset() -> Vec<(String, Vec<u8>)> {
    let mut root = Vec::new();
    record(&mut root, 100, 200, 300, 7, 2);
    record(&mut root, 4000, 4000, 2000, 9, 5);
    let mut child = Vec::new();
    record(&mut child, 5000, 6000, 100, 11, 2);

    vec![
        ("ept.json".to_string(), manifest().to_string().into_bytes()),
        (
            "ept-hierarchy/0-0-0-0.json".to_string(),
            json!({ "0-0-0-0": 2, "1-1-1-0": -1 }).to_string().into_bytes(),
        ),
        (
            "ept-hierarchy/1-1-1-0.json".to_string(),
            json!({ "1-1-1-0": 1 }).to_string().into_bytes(),
        ),
        ("ept-data/0-0-0-0.bin".to_string(), root),
        ("ept-data/1-1-1-0.bin".to_string(), child),
    ]
}

fn memory_client() -> MemoryClient {
    let mut client = MemoryClient::new();
    for (path, bytes) in dataset() {
        client.insert(format!("mem/{path}"), bytes);
    }
    client
}

#[tokio::test]
async fn metadata_queries() {
    let index = PointCloudIndex::from_url(
        "mem/ept.json",
        ResourceLoader::new(memory_client()),
        BinaryDecoder,
    )
    .await
    .unwrap();

    let extent = index.extent().unwrap();
    assert_eq!((extent.min.x, extent.min.y), (101.0, 202.0));
    assert_eq!((extent.max.x, extent.max.y), (150.0, 250.0));
    assert_eq!(index.crs().unwrap().horizontal.as_deref(), Some("3857"));

    let bounds = index.data_bounds().unwrap();
    assert!(bounds.min.abs().max_element() < 1e-6);
    assert!((bounds.max - DVec3::splat(6400.0)).abs().max_element() < 1e-6);

    let names: Vec<&str> = index
        .attributes()
        .unwrap()
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(names, ["X", "Y", "Z", "Intensity", "Classification"]);

    assert_eq!(
        index.metadata_statistic("X", StatisticKind::Maximum),
        Ok(Some(StatisticValue::Float(150.0)))
    );
    assert_eq!(index.metadata_statistic("X", StatisticKind::Count), Ok(None));
    assert_eq!(index.metadata_classes("Classification"), Ok(vec![2, 5]));

    let child: NodeId = "1-1-1-0".parse().unwrap();
    assert_eq!(index.node_point_count(&child), Ok(Some(1)));
    let child_bounds = index.node_bounds(&child).unwrap();
    assert!((child_bounds.min - DVec3::new(3200.0, 3200.0, 0.0)).abs().max_element() < 1e-6);
}

#[tokio::test]
async fn fetches_node_data() {
    let index = PointCloudIndex::from_url(
        "mem/ept.json",
        ResourceLoader::new(memory_client()),
        BinaryDecoder,
    )
    .await
    .unwrap();

    let block = index
        .fetch_node_data(&NodeId::ROOT, &["Classification", "X", "Y", "Z"])
        .await
        .unwrap();
    assert_eq!(block.point_count(), 2);
    assert_eq!(block.schema().record_size(), 13);
    assert_eq!(block.value(1, "Classification"), Some(5.0));

    let position = block.position(0).unwrap();
    assert!((position - DVec3::new(101.0, 202.0, 3.0)).abs().max_element() < 1e-9);

    let full = index.fetch_all_node_data(&"1-1-1-0".parse().unwrap()).await.unwrap();
    assert_eq!(full.value(0, "Intensity"), Some(11.0));
}

#[tokio::test]
async fn absent_node_is_not_fetched() {
    let client = Arc::new(memory_client());
    let index = PointCloudIndex::from_url(
        "mem/ept.json",
        ResourceLoader::from_arc(client.clone()),
        BinaryDecoder,
    )
    .await
    .unwrap();
    let requests = client.requests();

    let missing: NodeId = "1-0-0-0".parse().unwrap();
    assert_eq!(index.has_node(&missing), Ok(false));
    assert!(matches!(
        index.fetch_node_data(&missing, &["X"]).await,
        Err(FetchError::NodeNotFound(id)) if id == missing
    ));
    assert!(matches!(
        index.fetch_node_data(&NodeId::ROOT, &["Red"]).await,
        Err(FetchError::UnknownAttribute(name)) if name == "Red"
    ));
    assert_eq!(client.requests(), requests);
}

#[tokio::test]
async fn concurrent_fetches_share_one_index() {
    let index = Arc::new(
        PointCloudIndex::from_url(
            "mem/ept.json",
            ResourceLoader::new(memory_client()),
            BinaryDecoder,
        )
        .await
        .unwrap(),
    );

    let handles: Vec<_> = ["0-0-0-0", "1-1-1-0", "0-0-0-0", "1-1-1-0"]
        .into_iter()
        .map(|id| {
            let index = index.clone();
            tokio::spawn(async move {
                let id: NodeId = id.parse().unwrap();
                index.fetch_node_data(&id, &["Z"]).await.map(|b| b.point_count())
            })
        })
        .collect();

    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(counts, [2, 1, 2, 1]);
}

#[tokio::test]
async fn reads_dataset_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    for (path, bytes) in dataset() {
        let path = dir.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
    let url = format!("file://{}/ept.json", dir.path().display());

    let index = PointCloudIndex::from_url(
        &url,
        ResourceLoader::new(ept::resource::file::FileClient),
        BinaryDecoder,
    )
    .await
    .unwrap();

    assert_eq!(index.hierarchy().unwrap().len(), 2);
    let block = index.fetch_all_node_data(&NodeId::ROOT).await.unwrap();
    assert_eq!(block.value(0, "Intensity"), Some(7.0));
}

#[tokio::test]
async fn oversized_counts_do_not_abort() {
    let mut client = MemoryClient::new();
    client.insert("big/ept.json", manifest().to_string().into_bytes());
    client.insert(
        "big/ept-hierarchy/0-0-0-0.json",
        json!({ "0-0-0-0": i64::MAX, "1-0-0-0": i64::MAX, "1-0-0-1": i64::MAX })
            .to_string()
            .into_bytes(),
    );
    client.insert("big/ept-data/0-0-0-0.bin", vec![0u8; 13]);

    let index = PointCloudIndex::from_url(
        "big/ept.json",
        ResourceLoader::new(client),
        BinaryDecoder,
    )
    .await
    .unwrap();
    assert_eq!(index.node_point_count(&NodeId::ROOT), Ok(Some(i64::MAX as u64)));
    assert_eq!(index.hierarchy().unwrap().total_points(), u64::MAX);

    assert!(matches!(
        index.fetch_all_node_data(&NodeId::ROOT).await,
        Err(FetchError::Decode(_))
    ));
}
