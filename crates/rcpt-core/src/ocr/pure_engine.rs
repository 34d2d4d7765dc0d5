//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.
//!
//! The underlying engine is neither `Send` nor `Sync`, so it lives on one
//! worker thread for its whole life. [`PureOcrEngine`] is the handle: it
//! ships images to that thread and waits for the text boxes.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use image::imageops::FilterType;
use image::GenericImageView;
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;
use crate::models::receipt::{ReceiptImage, RecognizedText};

use super::{join_in_reading_order, TextBox, TextRecognizer};

type Reply = mpsc::Sender<Result<Vec<TextBox>, OcrError>>;

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
pub struct PureOcrEngine {
    jobs: mpsc::Sender<(ReceiptImage, Reply)>,
}

impl PureOcrEngine {
    /// Create an engine from the model files named in `config`, found in `model_dir`.
    ///
    /// Returns once the worker has loaded the models, or with the load error.
    pub fn from_dir(model_dir: &Path, config: OcrConfig) -> Result<Self, OcrError> {
        let [det_path, rec_path, dict_path] = config.model_files(model_dir);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!(
                    "missing model file {} (run `rcpt models download`)",
                    path.display()
                )));
            }
        }

        let (jobs, queue) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let paths = [det_path, rec_path, dict_path];

        thread::Builder::new()
            .name("rcpt-ocr".to_string())
            .spawn(move || run_worker(paths, config, queue, ready_tx))
            .map_err(|e| OcrError::ModelLoad(format!("failed to spawn OCR worker: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| OcrError::ModelLoad("OCR worker exited during startup".to_string()))??;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self { jobs })
    }

    /// Run detection and recognition, returning the raw text boxes.
    pub fn detect_boxes(&self, image: &ReceiptImage) -> Result<Vec<TextBox>, OcrError> {
        let (reply, answer) = mpsc::channel();

        self.jobs
            .send((image.clone(), reply))
            .map_err(|_| OcrError::Recognition("OCR worker is gone".to_string()))?;

        answer
            .recv()
            .map_err(|_| OcrError::Recognition("OCR worker stopped mid-job".to_string()))?
    }
}

impl TextRecognizer for PureOcrEngine {
    fn recognize(&self, image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
        let boxes = self.detect_boxes(image)?;
        Ok(RecognizedText::new(join_in_reading_order(boxes)))
    }
}

/// Worker loop: build the engine here, then serve jobs until every handle is dropped.
fn run_worker(
    [det_path, rec_path, dict_path]: [PathBuf; 3],
    config: OcrConfig,
    queue: mpsc::Receiver<(ReceiptImage, Reply)>,
    ready: mpsc::Sender<Result<(), OcrError>>,
) {
    let built = pure_onnx_ocr::engine::OcrEngineBuilder::new()
        .det_model_path(&det_path)
        .rec_model_path(&rec_path)
        .dictionary_path(&dict_path)
        .build()
        .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)));

    let engine = match built {
        Ok(engine) => {
            let _ = ready.send(Ok(()));
            engine
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    for (image, reply) in queue {
        let _ = reply.send(detect(&engine, &config, &image));
    }

    debug!("OCR worker shutting down");
}

fn detect(
    engine: &pure_onnx_ocr::engine::OcrEngine,
    config: &OcrConfig,
    image: &ReceiptImage,
) -> Result<Vec<TextBox>, OcrError> {
    let start = Instant::now();
    let mut decoded = image.decode()?;
    let (width, height) = decoded.dimensions();

    let max_side = config.max_image_size;
    if width.max(height) > max_side {
        decoded = decoded.resize(max_side, max_side, FilterType::Triangle);
        debug!(
            "Downscaled receipt from {}x{} to {}x{}",
            width,
            height,
            decoded.width(),
            decoded.height()
        );
    }

    let results = engine
        .run_from_image(&decoded)
        .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

    debug!("pure-onnx-ocr returned {} text regions", results.len());

    let boxes: Vec<TextBox> = results
        .iter()
        .map(|r| TextBox {
            bbox: polygon_to_bbox(&r.bounding_box),
            text: if config.keep_unk {
                r.text.clone()
            } else {
                r.text.replace("[UNK]", " ")
            },
            confidence: r.confidence,
        })
        .collect();

    info!(
        "OCR complete: {} text boxes in {}ms",
        boxes.len(),
        start.elapsed().as_millis()
    );

    Ok(boxes)
}

/// Convert a `Polygon<f64>` to our `[f32; 8]` bbox format.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
