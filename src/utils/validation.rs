use anyhow::{anyhow, Result};

pub fn validate_page_params(page: usize, page_size: usize) -> Result<()> {
    if page == 0 {
        return Err(anyhow!("Page numbers start at 1"));
    }

    if page_size == 0 {
        return Err(anyhow!("Page size must be greater than 0"));
    }

    if page_size > 100 {
        return Err(anyhow!("Page size too large (max 100)"));
    }

    Ok(())
}

pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(anyhow!("Embedding cannot be empty"));
    }

    for &value in embedding {
        if !value.is_finite() {
            return Err(anyhow!("Embedding contains invalid values (NaN or Infinity)"));
        }
    }

    if embedding.len() > 2048 {
        return Err(anyhow!("Embedding dimension too large (max 2048)"));
    }

    Ok(())
}

pub fn validate_embedding_dimension(embedding: &[f32], expected_dim: usize) -> Result<()> {
    if embedding.len() != expected_dim {
        return Err(anyhow!(
            "Embedding dimension mismatch: expected {}, got {}",
            expected_dim,
            embedding.len()
        ));
    }
    Ok(())
}
