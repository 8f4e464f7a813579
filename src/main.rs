use csv_core::{ReadFieldResult, ReaderBuilder};
use indtest::discretize::discretize_column;
use indtest::{
    ChiSquareTest, DataSet, IndTestFisherZ, IndependenceTest, Result, TestConfig, Variable,
};
use lasso::{Rodeo, Spur};
use std::collections::HashMap;
use std::io;
use std::iter;
use std::str;
use std::sync::Arc;

/// Reads a tab-separated table with a header row of variable names.
///
/// A column where every field parses as a number is continuous, and an empty field in it is a
/// missing value. Any other column is discrete, with one category per distinct label in order of
/// first appearance.
fn load_data<I: io::Read>(mut input: I) -> io::Result<DataSet> {
    let mut inputbuf = [0; 16384];
    let mut fieldbuf = [0; 1024];
    let mut fieldlen = 0;
    let mut header = Vec::new();
    let mut record = Vec::new();
    let mut rows: Vec<Vec<Spur>> = Vec::new();
    let mut rodeo = Rodeo::new();
    let mut tsv = ReaderBuilder::new().delimiter(b'\t').build();

    loop {
        let read = input.read(&mut inputbuf)?;
        let mut bytes = &inputbuf[..read];
        loop {
            let (result, nin, nout) = tsv.read_field(bytes, &mut fieldbuf[fieldlen..]);
            bytes = &bytes[nin..];
            fieldlen += nout;
            match result {
                ReadFieldResult::InputEmpty => break,
                ReadFieldResult::OutputFull => {
                    return Err(invalid_data(format!("field too long on line {}", tsv.line())));
                }
                ReadFieldResult::Field { record_end } => {
                    let field = str::from_utf8(&fieldbuf[..fieldlen])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    fieldlen = 0;

                    record.push(rodeo.get_or_intern(field));

                    if record_end {
                        if header.is_empty() {
                            header = std::mem::take(&mut record);
                        } else if record.len() != header.len() {
                            return Err(invalid_data(format!(
                                "expected {} fields on line {}, found {}",
                                header.len(),
                                tsv.line(),
                                record.len()
                            )));
                        } else {
                            rows.push(std::mem::take(&mut record));
                        }
                    }
                }
                ReadFieldResult::End => {
                    return build_data_set(&rodeo, &header, &rows).map_err(invalid_data);
                }
            }
        }
    }
}

fn build_data_set(rodeo: &Rodeo, header: &[Spur], rows: &[Vec<Spur>]) -> Result<DataSet> {
    let mut variables = Vec::with_capacity(header.len());
    let mut columns = Vec::with_capacity(header.len());

    for (column, &name) in header.iter().enumerate() {
        let name = rodeo.resolve(&name);
        let numbers: Option<Vec<f64>> = rows
            .iter()
            .map(|row| match rodeo.resolve(&row[column]).trim() {
                "" => Some(f64::NAN),
                f => f.parse().ok(),
            })
            .collect();

        match numbers {
            Some(values) => {
                variables.push(Variable::continuous(name));
                columns.push(values);
            }
            None => {
                let mut categories: HashMap<Spur, usize> = HashMap::new();
                let mut labels = Vec::new();
                let values: Vec<f64> = rows
                    .iter()
                    .map(|row| {
                        let spur = row[column];
                        *categories.entry(spur).or_insert_with(|| {
                            labels.push(rodeo.resolve(&spur));
                            labels.len() - 1
                        }) as f64
                    })
                    .collect();
                variables.push(Variable::discrete(name, &labels));
                columns.push(values);
            }
        }
    }

    let rows: Vec<Vec<f64>> = (0..rows.len())
        .map(|r| columns.iter().map(|c| c[r]).collect())
        .collect();
    DataSet::from_rows(variables, &rows)
}

fn invalid_data<E>(error: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, error)
}

fn invalid_input<E>(error: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidInput, error)
}

/// Every `k`-element subset of `items`, in lexicographic order of positions.
fn subsets<T: Clone>(items: &[T], k: usize) -> impl Iterator<Item = Vec<T>> + '_ {
    let mut next = if k <= items.len() {
        Some((0..k).collect::<Vec<usize>>())
    } else {
        None
    };
    iter::from_fn(move || {
        let current = next.take()?;
        let subset = current.iter().map(|&i| items[i].clone()).collect();

        let mut successor = current;
        let n = items.len();
        if let Some(pos) = (0..k).rev().find(|&pos| successor[pos] < n - k + pos) {
            successor[pos] += 1;
            for later in pos + 1..k {
                successor[later] = successor[later - 1] + 1;
            }
            next = Some(successor);
        }
        Some(subset)
    })
}

fn build_test(data: DataSet, config: TestConfig) -> Result<Box<dyn IndependenceTest>> {
    if data.is_continuous() {
        return Ok(Box::new(IndTestFisherZ::new(&data, config)?));
    }

    let mut data = data;
    for column in 0..data.num_columns() {
        if data.variable(column).is_continuous() {
            data = discretize_column(&data, column, 3)?;
        }
    }
    Ok(Box::new(ChiSquareTest::new(Arc::new(data), config)?))
}

fn main() -> io::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let alpha: f64 = match args.next() {
        Some(arg) => arg.parse().map_err(invalid_input)?,
        None => 0.05,
    };
    let depth: usize = match args.next() {
        Some(arg) => arg.parse().map_err(invalid_input)?,
        None => 1,
    };
    let config = TestConfig::new(alpha).map_err(invalid_input)?;

    let data = load_data(io::stdin().lock())?;
    println!(
        "data: {} rows, {} variables",
        data.num_rows(),
        data.num_columns()
    );

    let variables = data.variables().as_slice().to_vec();
    let mut test = build_test(data, config).map_err(invalid_data)?;

    for d in 0..=depth {
        for (i, x) in variables.iter().enumerate() {
            for y in &variables[i + 1..] {
                let others: Vec<Variable> = variables
                    .iter()
                    .filter(|v| *v != x && *v != y)
                    .cloned()
                    .collect();
                for z in subsets(&others, d) {
                    let result = test.check(x, y, &z).map_err(invalid_data)?;
                    let names: Vec<&str> = z.iter().map(Variable::name).collect();
                    println!(
                        "{} {} {} | {{{}}}  p = {}",
                        x,
                        if result.is_independent() { "_||_" } else { "-/-" },
                        y,
                        names.join(", "),
                        config.format_p_value(result.p_value())
                    );
                }
            }
        }
    }

    Ok(())
}
