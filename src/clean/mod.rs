// src/clean/mod.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, StringArray, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use csv::WriterBuilder;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    ops::Range,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

use crate::config::{CleanConfig, CleanFormat, Country};
use crate::survey::SurveyExport;

pub const ID_COLUMN: &str = "id";

/// Response IDs handed to one country's valid rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBlock {
    pub country: Country,
    pub ids: Range<u64>,
}

/// Number valid rows from 1 upward, continuing across countries in the given order.
pub fn assign_ids<'a>(valid: impl IntoIterator<Item = &'a SurveyExport>) -> Vec<IdBlock> {
    let mut next = 1u64;
    valid
        .into_iter()
        .map(|export| {
            let start = next;
            next += export.len() as u64;
            IdBlock {
                country: export.country,
                ids: start..next,
            }
        })
        .collect()
}

/// `<dir>/data_clean_<cc>.<ext>`
pub fn clean_path(dir: &Path, country: Country, format: CleanFormat) -> PathBuf {
    dir.join(format!(
        "data_clean_{}.{}",
        country.file_code(),
        format.extension()
    ))
}

/// Output headers: the export's own, with `id` overwritten in place or appended.
fn output_headers(export: &SurveyExport) -> (Vec<String>, usize) {
    let mut headers = export.headers.clone();
    let id_col = match headers.iter().position(|h| h == ID_COLUMN) {
        Some(i) => i,
        None => {
            headers.push(ID_COLUMN.to_string());
            headers.len() - 1
        }
    };
    (headers, id_col)
}

/// Write one country's valid responses and ids in the configured format.
#[tracing::instrument(level = "info", skip_all, fields(country = %export.country))]
pub fn write_clean(export: &SurveyExport, block: &IdBlock, cfg: &CleanConfig) -> Result<PathBuf> {
    fs::create_dir_all(&cfg.dir)
        .with_context(|| format!("creating clean directory {}", cfg.dir.display()))?;
    let path = clean_path(&cfg.dir, export.country, cfg.format);
    match cfg.format {
        CleanFormat::Csv => write_clean_csv(export, block, &path)?,
        CleanFormat::Parquet => {
            let bytes = write_clean_parquet(export, block, &path)?;
            info!(bytes, "parquet size");
        }
    }
    info!(path = %path.display(), rows = export.len(), "wrote clean responses");
    Ok(path)
}

pub fn write_clean_csv(export: &SurveyExport, block: &IdBlock, path: &Path) -> Result<()> {
    let (headers, id_col) = output_headers(export);
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record(&headers)?;

    for (row, id) in export.rows.iter().zip(block.ids.clone()) {
        let mut rec = row.cells.clone();
        rec.resize(headers.len(), String::new());
        rec[id_col] = id.to_string();
        wtr.write_record(&rec)?;
    }
    wtr.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// Write as Parquet: survey columns as nullable Utf8, `id` as UInt64. Returns file size.
pub fn write_clean_parquet(export: &SurveyExport, block: &IdBlock, path: &Path) -> Result<u64> {
    let (headers, id_col) = output_headers(export);

    let fields: Vec<Field> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i == id_col {
                Field::new(name, DataType::UInt64, false)
            } else {
                Field::new(name, DataType::Utf8, true)
            }
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let columns: Vec<ArrayRef> = (0..headers.len())
        .map(|j| {
            if j == id_col {
                Arc::new(UInt64Array::from_iter_values(block.ids.clone())) as ArrayRef
            } else {
                let values: Vec<Option<&str>> = export
                    .rows
                    .iter()
                    .map(|r| r.cells.get(j).map(String::as_str).filter(|s| !s.is_empty()))
                    .collect();
                Arc::new(StringArray::from(values)) as ArrayRef
            }
        })
        .collect();

    let batch = RecordBatch::try_new(Arc::clone(&schema), columns)
        .context("building clean response batch")?;

    let file =
        File::create(path).with_context(|| format!("creating file {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer =
        ArrowWriter::try_new(file, schema, Some(props)).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    let metadata = fs::metadata(path).context("getting file metadata")?;
    Ok(metadata.len())
}
