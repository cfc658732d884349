use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::options::Options;

fn column(record: &StringRecord, index: usize, what: &str) -> Result<&str> {
    record
        .get(index)
        .ok_or_else(|| Error::CsvParseError(format!("row missing its {what} column")))
}

fn column_index(header: &StringRecord, name: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::CsvParseError(format!("missing '{name}' column")))
}

/// Reads a semicolon-delimited options dataset against `model`, skipping (and
/// logging) any row whose basic-attribute or observed value is not a known
/// scale value name.
///
/// `place` is detected at the header by column count: present iff the header
/// has `leaves + 5` columns rather than `leaves + 4`.
pub fn read_options<R: Read>(reader: R, model: &Model) -> Result<Options> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(reader);
    let header = reader.headers()?.clone();
    let leaves = model.leaves();

    let has_place = match header.len() {
        n if n == leaves.len() + 5 => true,
        n if n == leaves.len() + 4 => false,
        n => {
            return Err(Error::CsvParseError(format!(
                "expected {} (no place) or {} (with place) columns, got {}",
                leaves.len() + 4,
                leaves.len() + 5,
                n
            )))
        }
    };

    let simulation_idx = column_index(&header, "simulation")?;
    let department_idx = column_index(&header, "department")?;
    let year_idx = column_index(&header, "year")?;
    let observed_idx = column_index(&header, "observed")?;
    let place_idx = has_place.then(|| column_index(&header, "place")).transpose()?;

    let leaf_cols = leaves
        .iter()
        .map(|&leaf| {
            let name = &model.attributes()[leaf].name;
            column_index(&header, name)
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut values = Vec::new();
    let mut observed = Vec::new();
    let mut simulation = Vec::new();
    let mut department = Vec::new();
    let mut year = Vec::new();
    let mut place: Option<Vec<String>> = has_place.then(Vec::new);

    for (line, record) in reader.records().enumerate() {
        let record = record?;

        let mut row = Vec::with_capacity(leaves.len());
        let mut unknown = None;
        for (j, &col) in leaf_cols.iter().enumerate() {
            let leaf = leaves[j];
            let cell = column(&record, col, &model.attributes()[leaf].name)?;
            match model.attributes()[leaf].scale.index_of(cell) {
                Some(v) => row.push(v as u8),
                None => {
                    unknown = Some((model.attributes()[leaf].name.clone(), cell.to_string()));
                    break;
                }
            }
        }
        if let Some((attribute, value)) = unknown {
            log::warn!(
                "row {line}: unknown value '{value}' for attribute '{attribute}', skipping"
            );
            continue;
        }

        let observed_cell = column(&record, observed_idx, "observed")?;
        let observed_value = match model.root().scale.index_of(observed_cell) {
            Some(v) => v as u8,
            None => {
                log::warn!("row {line}: unknown observed value '{observed_cell}', skipping");
                continue;
            }
        };

        values.extend(row);
        observed.push(observed_value);
        simulation.push(column(&record, simulation_idx, "simulation")?.to_string());
        department.push(
            column(&record, department_idx, "department")?
                .parse::<i64>()
                .map_err(|_| Error::CsvParseError(format!("row {line}: non-integer department")))?,
        );
        year.push(
            column(&record, year_idx, "year")?
                .parse::<i64>()
                .map_err(|_| Error::CsvParseError(format!("row {line}: non-integer year")))?,
        );
        if let (Some(place), Some(place_idx)) = (&mut place, place_idx) {
            place.push(column(&record, place_idx, "place")?.to_string());
        }
    }

    let n = simulation.len();
    let matrix = Array2::from_shape_vec((n, leaves.len()), values)
        .map_err(|e| Error::InternalError(e.to_string()))?;
    Options::new(matrix, observed, simulation, department, year, place, model)
}

/// Writes `options` in the same semicolon-delimited schema [`read_options`]
/// consumes, so `extract_options`/`merge_options` round-trip through the
/// identical facility a human-authored options file uses.
pub fn write_options<W: Write>(writer: W, model: &Model, options: &Options) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b';').from_writer(writer);
    let leaves = model.leaves();

    let mut header = vec!["simulation".to_string()];
    if options.place().is_some() {
        header.push("place".to_string());
    }
    header.push("department".to_string());
    header.push("year".to_string());
    header.extend(leaves.iter().map(|&leaf| model.attributes()[leaf].name.clone()));
    header.push("observed".to_string());
    writer.write_record(&header)?;

    for i in 0..options.len() {
        let mut record = vec![options.simulation()[i].clone()];
        if let Some(place) = options.place() {
            record.push(place[i].clone());
        }
        record.push(options.department()[i].to_string());
        record.push(options.year()[i].to_string());

        let row = options.row(i);
        for (j, &leaf) in leaves.iter().enumerate() {
            let name = model.attributes()[leaf]
                .scale
                .name_of(row[j] as usize)
                .ok_or_else(|| Error::InternalError("basic value out of its scale's range".into()))?;
            record.push(name.to_string());
        }
        let observed_name = model
            .root()
            .scale
            .name_of(options.observed()[i] as usize)
            .ok_or_else(|| Error::InternalError("observed value out of root scale's range".into()))?;
        record.push(observed_name.to_string());

        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::model::{Attribute, Scale};

    fn toy_model() -> Model {
        let a = Attribute::leaf("a", Scale::new(true, ["lo", "hi"]).unwrap());
        let b = Attribute::leaf("b", Scale::new(true, ["lo", "mid", "hi"]).unwrap());
        let root_scale = Scale::new(true, ["bad", "good"]).unwrap();
        let table = ndarray::Array1::from(vec![0u8, 0, 0, 1, 1, 1]);
        let root = Attribute::inner("root", root_scale, vec![1, 2], vec![2, 3], table).unwrap();
        Model::new(vec![root, a, b]).unwrap()
    }

    #[test]
    fn reads_a_well_formed_no_place_csv() {
        let model = toy_model();
        let csv = "simulation;department;year;a;b;observed\ns1;1;2020;lo;mid;bad\ns2;2;2021;hi;hi;good\n";
        let options = read_options(csv.as_bytes(), &model).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options.row(0)[0], 0);
        assert_eq!(options.row(1)[1], 2);
        assert_eq!(options.observed(), &[0, 1]);
        assert!(options.place().is_none());
    }

    #[test]
    fn detects_place_column_by_header_length() {
        let model = toy_model();
        let csv =
            "simulation;place;department;year;a;b;observed\ns1;here;1;2020;lo;mid;bad\n";
        let options = read_options(csv.as_bytes(), &model).unwrap();
        assert_eq!(options.place(), Some(&["here".to_string()][..]));
    }

    #[test]
    fn skips_rows_with_unknown_scale_values() {
        let model = toy_model();
        let csv = "simulation;department;year;a;b;observed\ns1;1;2020;lo;mid;bad\ns2;2;2021;nope;hi;good\n";
        let options = read_options(csv.as_bytes(), &model).unwrap();
        assert_eq!(options.len(), 1);
    }

    #[test]
    fn rejects_wrong_column_count() {
        let model = toy_model();
        let csv = "simulation;department;year;a;observed\ns1;1;2020;lo;bad\n";
        assert!(read_options(csv.as_bytes(), &model).is_err());
    }

    #[test]
    fn round_trips_through_write_and_read() {
        let model = toy_model();
        let matrix = Array2::from_shape_vec((2, 2), vec![0u8, 1, 1, 2]).unwrap();
        let options = Options::new(
            matrix,
            vec![0, 1],
            vec!["s1".into(), "s2".into()],
            vec![1, 2],
            vec![2020, 2021],
            None,
            &model,
        )
        .unwrap();

        let mut buf = Vec::new();
        write_options(&mut buf, &model, &options).unwrap();
        let reread = read_options(&buf[..], &model).unwrap();

        assert_eq!(reread.len(), options.len());
        assert_eq!(reread.observed(), options.observed());
        assert_eq!(reread.row(1)[1], options.row(1)[1]);
    }
}
