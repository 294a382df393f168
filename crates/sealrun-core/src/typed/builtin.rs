//! 組み込み component の定義
//!
//! Each type declares its parameters and the worker script that runs it.
//! Most components go through [`StandardFiller`]; the ones whose worker
//! reads parameters in combination get a typed filler that checks those
//! combinations before the worker starts.

use std::collections::HashSet;

use serde_json::Value;

use crate::domain::errors::{Result, SidecarError};
use crate::domain::job::TableSchema;
use crate::domain::job::dist_data_type::{
    INDIVIDUAL_TABLE, LGBM_MODEL, LR_MODEL, REPORT, WOE_RUNNING_RULE, XGB_MODEL,
};

use super::component::{AttrDef, Component, ComponentDef, InputDef, OutputDef};
use super::filler::{FillContext, Filler, StandardFiller, standard_document};
use super::reader::EvalParamReader;
use super::registry::{ComponentRegistry, RegistryError};

pub const VERSION: &str = "0.0.1";

// ---- preprocessing ----

/// Private set intersection of two tables on their key columns.
pub struct Psi;

impl Component for Psi {
    const DOMAIN: &'static str = "preprocessing";
    const NAME: &'static str = "psi";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "psi.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .input(InputDef::new("input1", &[INDIVIDUAL_TABLE]).column("key", 1, 0))
            .input(InputDef::new("input2", &[INDIVIDUAL_TABLE]).column("key", 1, 0))
            .output(OutputDef::new("psi_output", &[INDIVIDUAL_TABLE]))
    }
}

pub struct FeatureFilter;

impl Component for FeatureFilter {
    const DOMAIN: &'static str = "preprocessing";
    const NAME: &'static str = "feature_filter";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "feature_filter.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .input(InputDef::new("input_data", &[INDIVIDUAL_TABLE]).column("drop_features", 1, 0))
            .output(OutputDef::new("output_data", &[INDIVIDUAL_TABLE]))
    }
}

pub struct TrainTestSplit;

impl Component for TrainTestSplit {
    const DOMAIN: &'static str = "preprocessing";
    const NAME: &'static str = "train_test_split";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "train_test_split.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .attr(AttrDef::float("train_size", 0.75).lower(0.0, false).upper(1.0, false))
            .attr(AttrDef::boolean("fix_random", true))
            .attr(AttrDef::int("random_state", 1024).lower(0.0, false))
            .attr(AttrDef::boolean("shuffle", true))
            .input(InputDef::new("input_data", &[INDIVIDUAL_TABLE]))
            .output(OutputDef::new("train", &[INDIVIDUAL_TABLE]))
            .output(OutputDef::new("test", &[INDIVIDUAL_TABLE]))
    }
}

/// The split worker seeds its shuffle with `random_state` unless that is 0.
/// With `fix_random` off the seed is cleared so every run shuffles anew.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitFiller;

impl Filler<TrainTestSplit> for SplitFiller {
    fn fill(&self, ctx: &FillContext<'_>) -> Result<Value> {
        let reader = ctx.reader;
        let seed = if reader.get_bool("fix_random")? {
            reader.get_int("random_state")?
        } else {
            0
        };
        let mut doc = standard_document(TrainTestSplit::NAME, ctx)?;
        doc["random_state"] = Value::from(seed);
        Ok(doc)
    }
}

// ---- stats ----

pub struct Pearsonr;

impl Component for Pearsonr {
    const DOMAIN: &'static str = "stats";
    const NAME: &'static str = "pearsonr";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "pearsonr.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .input(InputDef::new("input_data", &[INDIVIDUAL_TABLE]).column("feature_selects", 0, 0))
            .output(OutputDef::new("report", &[REPORT]))
    }
}

/// Variance inflation factor; an empty selection means every feature.
pub struct Vif;

impl Component for Vif {
    const DOMAIN: &'static str = "stats";
    const NAME: &'static str = "vif";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "vif.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .input(InputDef::new("input_data", &[INDIVIDUAL_TABLE]).column("feature_selects", 0, 0))
            .output(OutputDef::new("report", &[REPORT]))
    }
}

pub struct TableStatistics;

impl Component for TableStatistics {
    const DOMAIN: &'static str = "stats";
    const NAME: &'static str = "table_statistics";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "table_statistics.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .input(InputDef::new("input_data", &[INDIVIDUAL_TABLE]))
            .output(OutputDef::new("report", &[REPORT]))
    }
}

// ---- feature ----

pub struct WoeBinning;

impl Component for WoeBinning {
    const DOMAIN: &'static str = "feature";
    const NAME: &'static str = "woe_binning";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "woe_binning.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .attr(AttrDef::string("binning_method", "quantile").allowed(&["quantile", "bucket"]))
            .attr(AttrDef::string("positive_label", "1"))
            .attr(AttrDef::int("bin_num", 10).lower(0.0, false))
            .input(
                InputDef::new("input_data", &[INDIVIDUAL_TABLE])
                    .column("feature_selects", 1, 0)
                    .column("label", 1, 1),
            )
            .output(OutputDef::new("woe_rule", &[WOE_RUNNING_RULE]))
    }
}

pub struct WoeSubstitution;

impl Component for WoeSubstitution {
    const DOMAIN: &'static str = "feature";
    const NAME: &'static str = "woe_substitution";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "woe_substitution.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .input(InputDef::new("input_data", &[INDIVIDUAL_TABLE]))
            .input(InputDef::new("woe_rule", &[WOE_RUNNING_RULE]))
            .output(OutputDef::new("output_data", &[INDIVIDUAL_TABLE]))
    }
}

// ---- ml.train ----

fn train_dataset() -> InputDef {
    InputDef::new("train_dataset", &[INDIVIDUAL_TABLE])
        .column("ids", 0, 0)
        .column("label", 1, 1)
}

pub struct XgbTrain;

impl Component for XgbTrain {
    const DOMAIN: &'static str = "ml.train";
    const NAME: &'static str = "xgb_train";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "xgb.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .attr(AttrDef::int("num_boost_round", 10).lower(1.0, true).upper(1024.0, true))
            .attr(AttrDef::int("max_depth", 6).lower(1.0, true).upper(16.0, true))
            .attr(AttrDef::int("max_leaves", 0).lower(0.0, true).upper(32768.0, true))
            .attr(AttrDef::int("seed", 42).lower(0.0, true))
            .attr(AttrDef::float("learning_rate", 0.3).lower(0.0, false).upper(1.0, true))
            .attr(AttrDef::float("lambda", 1.0).lower(0.0, true).upper(10000.0, true))
            .attr(AttrDef::float("gamma", 0.0).lower(0.0, true).upper(10000.0, true))
            .attr(AttrDef::float("colsample_bytree", 1.0).lower(0.0, false).upper(1.0, true))
            .attr(AttrDef::float("base_score", 0.5).lower(0.0, false).upper(1.0, false))
            .attr(AttrDef::float("min_child_weight", 1.0).lower(0.0, true).upper(1000.0, true))
            .attr(
                AttrDef::string("objective", "binary:logistic")
                    .allowed(&["reg:squarederror", "binary:logistic"]),
            )
            .attr(AttrDef::float("alpha", 0.0).lower(0.0, true).upper(10000.0, true))
            .attr(AttrDef::float("subsample", 1.0).lower(0.0, false).upper(1.0, true))
            .attr(AttrDef::int("max_bin", 10).lower(0.0, false).upper(254.0, false))
            .attr(
                AttrDef::string("tree_method", "auto").allowed(&["auto", "exact", "approx", "hist"]),
            )
            .attr(AttrDef::string("booster", "gbtree").allowed(&["gbtree", "gblinear", "dart"]))
            .input(train_dataset())
            .output(OutputDef::new("output_model", &[XGB_MODEL]))
    }
}

pub struct LrTrain;

impl Component for LrTrain {
    const DOMAIN: &'static str = "ml.train";
    const NAME: &'static str = "lr_train";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "lr.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .attr(AttrDef::int("max_iter", 10).lower(1.0, true).upper(10000.0, true))
            .attr(AttrDef::string("reg_type", "logistic").allowed(&["linear", "logistic"]))
            .attr(AttrDef::float("l2_norm", 1.0).lower(0.0, true).upper(10000.0, false))
            .attr(AttrDef::float("tol", 1e-4).lower(0.0, false).upper(1.0, false))
            .attr(
                AttrDef::string("penalty", "l2").allowed(&["l1", "l2", "elasticnet", "None"]),
            )
            .input(train_dataset())
            .output(OutputDef::new("output_model", &[LR_MODEL]))
    }
}

/// The lr worker builds a ridge model for `linear` and a default-solver
/// logistic model otherwise; that solver handles only `l2` or no penalty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LrTrainFiller;

impl Filler<LrTrain> for LrTrainFiller {
    fn fill(&self, ctx: &FillContext<'_>) -> Result<Value> {
        let reader = ctx.reader;
        let reg_type = reader.get_str("reg_type")?;
        let penalty = reader.get_str("penalty")?;
        if reg_type == "logistic" && !matches!(penalty, "l2" | "None") {
            return Err(SidecarError::schema(format!(
                "penalty `{penalty}` is not available for logistic regression"
            )));
        }
        if reg_type == "linear" && penalty != "l2" {
            return Err(SidecarError::schema(format!(
                "linear regression is l2-regularized, penalty `{penalty}` does not apply"
            )));
        }
        if reg_type == "logistic" && penalty == "None" && reader.get_float("l2_norm")? != 0.0 {
            return Err(SidecarError::schema(
                "l2_norm must be 0 when penalty is `None`".to_string(),
            ));
        }
        standard_document(LrTrain::NAME, ctx)
    }
}

pub struct LgbmTrain;

impl Component for LgbmTrain {
    const DOMAIN: &'static str = "ml.train";
    const NAME: &'static str = "lgbm_train";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "lgbm.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .attr(AttrDef::int("n_estimators", 10).lower(1.0, true).upper(1024.0, true))
            .attr(AttrDef::string("objective", "binary").allowed(&["regression", "binary"]))
            .attr(AttrDef::string("boosting_type", "gbdt").allowed(&["gbdt", "rf", "dart"]))
            .attr(AttrDef::float("learning_rate", 0.1).lower(0.0, false).upper(1.0, true))
            .attr(AttrDef::int("num_leaves", 31).lower(2.0, true).upper(1024.0, true))
            .input(train_dataset())
            .output(OutputDef::new("output_model", &[LGBM_MODEL]))
    }
}

// ---- ml.predict ----

/// Shared by the three predict components; only the model type differs.
fn predict_definition(name: &'static str, model_type: &'static str) -> ComponentDef {
    ComponentDef::new("ml.predict", name, VERSION)
        .attr(AttrDef::string("pred_name", "pred"))
        .attr(AttrDef::boolean("save_label", false))
        .attr(AttrDef::string("label_name", "label"))
        .attr(AttrDef::boolean("save_id", false))
        .attr(AttrDef::string("id_name", "id"))
        .attr(AttrDef::strings("col_names"))
        .input(
            InputDef::new("feature_dataset", &[INDIVIDUAL_TABLE])
                .column("ids", 0, 1)
                .column("label", 0, 1),
        )
        .input(InputDef::new("model", &[model_type]))
        .output(OutputDef::new("pred", &[INDIVIDUAL_TABLE]))
}

pub struct XgbPredict;

impl Component for XgbPredict {
    const DOMAIN: &'static str = "ml.predict";
    const NAME: &'static str = "xgb_predict";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "predict.py";

    fn definition() -> ComponentDef {
        predict_definition(Self::NAME, XGB_MODEL)
    }
}

pub struct LrPredict;

impl Component for LrPredict {
    const DOMAIN: &'static str = "ml.predict";
    const NAME: &'static str = "lr_predict";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "predict.py";

    fn definition() -> ComponentDef {
        predict_definition(Self::NAME, LR_MODEL)
    }
}

pub struct LgbmPredict;

impl Component for LgbmPredict {
    const DOMAIN: &'static str = "ml.predict";
    const NAME: &'static str = "lgbm_predict";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "predict.py";

    fn definition() -> ComponentDef {
        predict_definition(Self::NAME, LGBM_MODEL)
    }
}

/// The predict worker copies id and label columns into its output when
/// asked to, falling back to the table schema when none is selected.
/// Checks that such a column exists and that output column names are
/// distinct.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictFiller;

impl<C: Component> Filler<C> for PredictFiller {
    fn fill(&self, ctx: &FillContext<'_>) -> Result<Value> {
        let reader = ctx.reader;
        let mut columns = vec![reader.get_str("pred_name")?];
        if reader.get_bool("save_id")? {
            require_column(reader, "ids", |s| &s.ids)?;
            columns.push(reader.get_str("id_name")?);
        }
        if reader.get_bool("save_label")? {
            require_column(reader, "label", |s| &s.labels)?;
            columns.push(reader.get_str("label_name")?);
        }
        columns.extend(reader.get_strings("col_names")?.iter().map(String::as_str));

        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(**c)) {
            return Err(SidecarError::schema(format!(
                "prediction output column `{dup}` appears twice"
            )));
        }
        standard_document(C::NAME, ctx)
    }
}

fn require_column(
    reader: &EvalParamReader,
    column: &str,
    from_schema: impl Fn(&TableSchema) -> &Vec<String>,
) -> Result<()> {
    if !reader.input_columns("feature_dataset", column).is_empty() {
        return Ok(());
    }
    let in_schema = reader
        .inputs()
        .first()
        .and_then(|d| d.table_schema())
        .is_some_and(|s| !from_schema(s).is_empty());
    if in_schema {
        return Ok(());
    }
    Err(SidecarError::schema(format!(
        "save_{} needs a `{column}` column on feature_dataset",
        if column == "ids" { "id" } else { column }
    )))
}

// ---- ml.eval ----

fn eval_predictions() -> InputDef {
    InputDef::new("predictions", &[INDIVIDUAL_TABLE])
        .column("label", 1, 1)
        .column("score", 1, 1)
}

pub struct BiclassificationEval;

impl Component for BiclassificationEval {
    const DOMAIN: &'static str = "ml.eval";
    const NAME: &'static str = "biclassification_eval";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "biclassification_eval.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .attr(AttrDef::int("bucket_num", 10).lower(1.0, true))
            .attr(AttrDef::int("min_item_cnt_per_bucket", 2).lower(2.0, true))
            .input(eval_predictions())
            .output(OutputDef::new("reports", &[REPORT]))
    }
}

pub struct PredictionBiasEval;

impl Component for PredictionBiasEval {
    const DOMAIN: &'static str = "ml.eval";
    const NAME: &'static str = "prediction_bias_eval";
    const VERSION: &'static str = VERSION;
    const WORKER_SCRIPT: &'static str = "prediction_bias_eval.py";

    fn definition() -> ComponentDef {
        ComponentDef::new(Self::DOMAIN, Self::NAME, Self::VERSION)
            .attr(AttrDef::int("bucket_num", 10).lower(1.0, true))
            .attr(AttrDef::int("min_item_cnt_per_bucket", 2).lower(2.0, true))
            .attr(
                AttrDef::string("bucket_method", "equal_width")
                    .allowed(&["equal_width", "equal_frequency"]),
            )
            .input(eval_predictions())
            .output(OutputDef::new("reports", &[REPORT]))
    }
}

/// Register every built-in component with its filler.
pub fn register_builtins(
    registry: &mut ComponentRegistry,
) -> std::result::Result<(), RegistryError> {
    registry.register::<Psi, _>(StandardFiller)?;
    registry.register::<FeatureFilter, _>(StandardFiller)?;
    registry.register::<TrainTestSplit, _>(SplitFiller)?;
    registry.register::<Pearsonr, _>(StandardFiller)?;
    registry.register::<Vif, _>(StandardFiller)?;
    registry.register::<TableStatistics, _>(StandardFiller)?;
    registry.register::<WoeBinning, _>(StandardFiller)?;
    registry.register::<WoeSubstitution, _>(StandardFiller)?;
    registry.register::<XgbTrain, _>(StandardFiller)?;
    registry.register::<LrTrain, _>(LrTrainFiller)?;
    registry.register::<LgbmTrain, _>(StandardFiller)?;
    registry.register::<XgbPredict, _>(PredictFiller)?;
    registry.register::<LrPredict, _>(PredictFiller)?;
    registry.register::<LgbmPredict, _>(PredictFiller)?;
    registry.register::<BiclassificationEval, _>(StandardFiller)?;
    registry.register::<PredictionBiasEval, _>(StandardFiller)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::ErrorKind;
    use crate::domain::job::{Attribute, DataRef, DistData, DistMeta, JobParams};
    use crate::typed::filler::{DynFiller, OutputPaths, TypedFiller};
    use rstest::rstest;

    fn all_definitions() -> Vec<ComponentDef> {
        vec![
            Psi::definition(),
            FeatureFilter::definition(),
            TrainTestSplit::definition(),
            Pearsonr::definition(),
            Vif::definition(),
            TableStatistics::definition(),
            WoeBinning::definition(),
            WoeSubstitution::definition(),
            XgbTrain::definition(),
            LrTrain::definition(),
            LgbmTrain::definition(),
            XgbPredict::definition(),
            LrPredict::definition(),
            LgbmPredict::definition(),
            BiclassificationEval::definition(),
            PredictionBiasEval::definition(),
        ]
    }

    #[rstest]
    #[case(Psi::definition(), "preprocessing/psi:0.0.1", 2, 1)]
    #[case(FeatureFilter::definition(), "preprocessing/feature_filter:0.0.1", 1, 1)]
    #[case(TrainTestSplit::definition(), "preprocessing/train_test_split:0.0.1", 1, 2)]
    #[case(Vif::definition(), "stats/vif:0.0.1", 1, 1)]
    #[case(TableStatistics::definition(), "stats/table_statistics:0.0.1", 1, 1)]
    #[case(WoeSubstitution::definition(), "feature/woe_substitution:0.0.1", 2, 1)]
    #[case(XgbTrain::definition(), "ml.train/xgb_train:0.0.1", 1, 1)]
    #[case(LrPredict::definition(), "ml.predict/lr_predict:0.0.1", 2, 1)]
    #[case(BiclassificationEval::definition(), "ml.eval/biclassification_eval:0.0.1", 1, 1)]
    #[case(PredictionBiasEval::definition(), "ml.eval/prediction_bias_eval:0.0.1", 1, 1)]
    fn definitions(
        #[case] def: ComponentDef,
        #[case] key: &str,
        #[case] inputs: usize,
        #[case] outputs: usize,
    ) {
        assert_eq!(def.key(), key);
        assert_eq!(def.inputs.len(), inputs);
        assert_eq!(def.outputs.len(), outputs);
    }

    #[test]
    fn defaults_satisfy_their_own_bounds() {
        for def in all_definitions() {
            for attr in &def.attrs {
                if let Some(default) = &attr.default {
                    assert!(attr.check(default).is_ok(), "{}: {}", def.key(), attr.name);
                }
            }
        }
    }

    #[test]
    fn predict_components_differ_only_in_model_type() {
        let lr = LrPredict::definition();
        let lgbm = LgbmPredict::definition();
        assert_eq!(lr.inputs[1].types, [LR_MODEL]);
        assert_eq!(lgbm.inputs[1].types, [LGBM_MODEL]);
        assert_eq!(lr.attrs, XgbPredict::definition().attrs);
    }

    #[test]
    fn all_builtins_register() {
        let mut registry = ComponentRegistry::new();
        register_builtins(&mut registry).unwrap();
        assert_eq!(registry.registered_keys().len(), 16);
        for key in [
            "ml.predict/xgb_predict:0.0.1",
            "ml.predict/lr_predict:0.0.1",
            "ml.predict/lgbm_predict:0.0.1",
        ] {
            assert_eq!(registry.get(key).unwrap().worker_script(), "predict.py");
        }
        assert_eq!(
            registry.get("feature/woe_binning:0.0.1").unwrap().worker_script(),
            "woe_binning.py"
        );
    }

    // ---- fillers ----

    fn table(schema: TableSchema) -> DistData {
        DistData {
            name: "t".into(),
            data_type: INDIVIDUAL_TABLE.into(),
            meta: Some(DistMeta {
                type_url: None,
                schema: Some(schema),
            }),
            data_refs: vec![DataRef::default()],
        }
    }

    fn model(data_type: &str) -> DistData {
        DistData {
            name: "m".into(),
            data_type: data_type.into(),
            meta: None,
            data_refs: vec![DataRef::default()],
        }
    }

    fn job(def: &ComponentDef, inputs: Vec<DistData>, attrs: &[(&str, Attribute)]) -> JobParams {
        JobParams {
            domain: def.domain.into(),
            name: def.name.into(),
            version: def.version.into(),
            attr_paths: attrs.iter().map(|(p, _)| p.to_string()).collect(),
            attrs: attrs.iter().map(|(_, a)| a.clone()).collect(),
            inputs,
            output_uris: def.outputs.iter().map(|o| format!("o?id={0}&uri={0}", o.name)).collect(),
        }
    }

    fn fill<C: Component, F: Filler<C>>(filler: F, params: JobParams) -> Result<Value> {
        let def = C::definition();
        let reader = EvalParamReader::new(params, def.clone())?;
        let inputs: Vec<PathBuf> = def.inputs.iter().map(|i| PathBuf::from(i.name)).collect();
        let outputs: Vec<OutputPaths> = def
            .outputs
            .iter()
            .map(|o| OutputPaths {
                data_path: PathBuf::from(o.name),
                schema_path: PathBuf::from(o.name),
            })
            .collect();
        TypedFiller::<C, F>::new(filler).fill_dyn(&FillContext {
            reader: &reader,
            input_paths: &inputs,
            outputs: &outputs,
        })
    }

    fn predict(schema: TableSchema, attrs: &[(&str, Attribute)]) -> Result<Value> {
        let def = XgbPredict::definition();
        let params = job(&def, vec![table(schema), model(XGB_MODEL)], attrs);
        fill::<XgbPredict, _>(PredictFiller, params)
    }

    #[test]
    fn save_id_uses_selected_or_schema_ids() {
        let doc = predict(
            TableSchema::default(),
            &[
                ("save_id", Attribute::boolean(true)),
                ("input/feature_dataset/ids", Attribute::strings(["uid"])),
            ],
        )
        .unwrap();
        assert_eq!(doc["save_id"], true);
        assert_eq!(doc["inputs"][0]["ids"], serde_json::json!(["uid"]));

        let schema = TableSchema {
            ids: vec!["uid".into()],
            ..TableSchema::default()
        };
        assert!(predict(schema, &[("save_id", Attribute::boolean(true))]).is_ok());
    }

    #[test]
    fn save_label_without_any_label_column_is_rejected() {
        let err = predict(TableSchema::default(), &[("save_label", Attribute::boolean(true))])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("save_label"), "{err}");
    }

    #[test]
    fn colliding_prediction_columns_are_rejected() {
        let schema = TableSchema {
            labels: vec!["y".into()],
            ..TableSchema::default()
        };
        let err = predict(
            schema.clone(),
            &[
                ("save_label", Attribute::boolean(true)),
                ("label_name", Attribute::string("pred")),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("`pred` appears twice"), "{err}");

        let err = predict(schema, &[("col_names", Attribute::strings(["x", "x"]))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[rstest]
    #[case(true, 1024)]
    #[case(false, 0)]
    fn split_seed_follows_fix_random(#[case] fix_random: bool, #[case] seed: i64) {
        let def = TrainTestSplit::definition();
        let params = job(
            &def,
            vec![table(TableSchema::default())],
            &[("fix_random", Attribute::boolean(fix_random))],
        );
        let doc = fill::<TrainTestSplit, _>(SplitFiller, params).unwrap();
        assert_eq!(doc["random_state"], seed);
        assert_eq!(doc["train_size"], 0.75);
    }

    #[rstest]
    #[case("logistic", "l2", 1.0, true)]
    #[case("logistic", "None", 0.0, true)]
    #[case("logistic", "None", 1.0, false)]
    #[case("logistic", "l1", 1.0, false)]
    #[case("logistic", "elasticnet", 1.0, false)]
    #[case("linear", "l2", 1.0, true)]
    #[case("linear", "l1", 1.0, false)]
    fn lr_penalty_combinations(
        #[case] reg_type: &str,
        #[case] penalty: &str,
        #[case] l2_norm: f64,
        #[case] ok: bool,
    ) {
        let def = LrTrain::definition();
        let params = job(
            &def,
            vec![table(TableSchema::default())],
            &[
                ("reg_type", Attribute::string(reg_type)),
                ("penalty", Attribute::string(penalty)),
                ("l2_norm", Attribute::float(l2_norm)),
                ("input/train_dataset/label", Attribute::strings(["y"])),
            ],
        );
        let result = fill::<LrTrain, _>(LrTrainFiller, params);
        assert_eq!(result.is_ok(), ok, "{result:?}");
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::Schema);
        }
    }
}
