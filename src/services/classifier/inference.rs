use crate::error::ClassifierError;
use crate::models::classify_types::Candidate;
use crate::models::image_types::SelectedImage;
use crate::services::classifier::interface::InferenceEngine;
use crate::services::exif_service;
use image::{DynamicImage, ImageReader};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::io::Cursor;
use std::sync::Mutex;

const CROP_PCT: f32 = 0.875;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode an encoded image and turn it upright according to its EXIF tag.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ClassifierError> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ClassifierError::ImageDecode(e.to_string()))?
        .decode()
        .map_err(|e| ClassifierError::ImageDecode(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ClassifierError::ImageDecode("image has no pixels".to_string()));
    }

    let orientation = exif_service::read_orientation(bytes);
    if orientation != 1 {
        tracing::debug!(orientation, "Applying EXIF orientation");
    }
    Ok(exif_service::apply_orientation(img, orientation))
}

pub fn preprocess_image(
    img: &DynamicImage,
    crop_size: u32,
) -> Result<Array4<f32>, ClassifierError> {
    // Resize shortest edge to ceil(crop_size / crop_pct), then center crop
    let resize_size = (crop_size as f32 / CROP_PCT).ceil() as u32;
    let (w, h) = (img.width(), img.height());
    let (new_w, new_h) = if w < h {
        (resize_size, ((h as f32 / w as f32) * resize_size as f32).round() as u32)
    } else {
        (((w as f32 / h as f32) * resize_size as f32).round() as u32, resize_size)
    };
    let resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);

    let crop_x = (new_w.saturating_sub(crop_size)) / 2;
    let crop_y = (new_h.saturating_sub(crop_size)) / 2;
    let cropped = resized.crop_imm(crop_x, crop_y, crop_size, crop_size);
    let rgb = cropped.to_rgb8();

    // Normalize while writing straight into planar CHW layout.
    let raw = rgb.into_raw();
    let hw = (crop_size * crop_size) as usize;
    if raw.len() != 3 * hw {
        return Err(ClassifierError::ImageDecode(format!(
            "cropped image has {} bytes, expected {}",
            raw.len(),
            3 * hw
        )));
    }
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in raw.chunks_exact(3).enumerate() {
        data[i] = (pixel[0] as f32 / 255.0 - MEAN[0]) / STD[0];
        data[hw + i] = (pixel[1] as f32 / 255.0 - MEAN[1]) / STD[1];
        data[2 * hw + i] = (pixel[2] as f32 / 255.0 - MEAN[2]) / STD[2];
    }

    Array4::from_shape_vec((1, 3, crop_size as usize, crop_size as usize), data)
        .map_err(|e| ClassifierError::Execution(format!("Failed to create tensor: {}", e)))
}

/// Softmax over raw logits, then the `top_k` most likely labels.
pub fn top_k_candidates(logits: &[f32], labels: &[String], top_k: usize) -> Vec<Candidate> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();

    let mut indexed: Vec<(usize, f32)> = logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .enumerate()
        .collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(top_k);

    indexed
        .into_iter()
        .map(|(idx, confidence)| {
            let label = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", idx));
            Candidate { label, confidence }
        })
        .collect()
}

pub fn run_inference_with_model(
    model: &mut Session,
    input: Array4<f32>,
    labels: &[String],
    top_k: usize,
) -> Result<Vec<Candidate>, ClassifierError> {
    let input_name = model
        .inputs()
        .first()
        .map(|input| input.name().to_string())
        .ok_or_else(|| ClassifierError::Execution("Model declares no inputs".to_string()))?;

    let input_tensor = Value::from_array(input).map_err(|e| {
        ClassifierError::Execution(format!("Failed to create tensor value: {}", e))
    })?;

    let outputs = model
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| ClassifierError::Execution(e.to_string()))?;

    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| ClassifierError::Execution("Model produced no outputs".to_string()))?;

    let (_, logits) = output_value.try_extract_tensor::<f32>().map_err(|e| {
        ClassifierError::Execution(format!("Failed to extract output tensor: {}", e))
    })?;

    Ok(top_k_candidates(logits, labels, top_k))
}

/// ONNX Runtime backed classifier built by the model manager.
pub struct OnnxEngine {
    // `Session::run` takes `&mut self`; requests are serialized here.
    session: Mutex<Session>,
    labels: Vec<String>,
    crop_size: u32,
    top_k: usize,
}

impl OnnxEngine {
    pub fn new(session: Session, labels: Vec<String>, crop_size: u32, top_k: usize) -> Self {
        Self {
            session: Mutex::new(session),
            labels,
            crop_size,
            top_k,
        }
    }
}

impl InferenceEngine for OnnxEngine {
    fn classify(&self, image: &SelectedImage) -> Result<Vec<Candidate>, ClassifierError> {
        let decoded = decode_image(image.bytes())?;
        let tensor = preprocess_image(&decoded, self.crop_size)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Execution("Model session is poisoned".to_string()))?;
        run_inference_with_model(&mut session, tensor, &self.labels, self.top_k)
    }
}
