use aicache_embeddings::{Embeddings, FakeEmbeddings};

#[tokio::test]
async fn fake_embeddings_are_deterministic() {
    let embeddings = FakeEmbeddings::new(8);
    let a = embeddings.embed_query("What is Rust?").await.unwrap();
    let b = embeddings.embed_query("What is Rust?").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 8);
}

#[tokio::test]
async fn fake_embeddings_are_normalized() {
    let embeddings = FakeEmbeddings::default();
    let v = embeddings.embed_query("hello world").await.unwrap();
    let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((magnitude - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn fake_embeddings_empty_text_is_zero_vector() {
    let embeddings = FakeEmbeddings::new(3);
    let v = embeddings.embed_query("").await.unwrap();
    assert_eq!(v, vec![0.0, 0.0, 0.0]);
}
